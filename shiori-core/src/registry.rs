//! ブレークポイント管理

use crate::{Breakpoint, BreakpointId, DebugError, Result};

/// ブレークポイントレジストリ
///
/// 追加順にブレークポイントを保持します。行ブレークポイントとメソッド
/// ブレークポイントは同じID空間を共有し、削除してもIDは詰めず再利用もしません。
#[derive(Debug)]
pub struct BreakpointRegistry {
    breakpoints: Vec<Breakpoint>,
    next_id: BreakpointId,
}

impl BreakpointRegistry {
    /// 空のレジストリを作成する
    pub fn new() -> Self {
        Self {
            breakpoints: Vec::new(),
            next_id: 0,
        }
    }

    fn allocate_id(&mut self) -> BreakpointId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// 行ブレークポイントを追加する
    pub fn add_line(&mut self, file: &str, line: u32) -> Result<Breakpoint> {
        if file.is_empty() {
            return Err(DebugError::InvalidBreakpoint("file must not be empty".to_string()));
        }
        if line == 0 {
            return Err(DebugError::InvalidBreakpoint(format!(
                "line must be positive: {}:{}",
                file, line
            )));
        }

        let bp = Breakpoint::line(self.allocate_id(), file, line);
        self.breakpoints.push(bp.clone());
        Ok(bp)
    }

    /// メソッドブレークポイントを追加する
    pub fn add_method(
        &mut self,
        class_name: &str,
        method_name: &str,
        is_class_method: bool,
    ) -> Result<Breakpoint> {
        if class_name.is_empty() || method_name.is_empty() {
            return Err(DebugError::InvalidBreakpoint(format!(
                "class and method must not be empty: '{}' '{}'",
                class_name, method_name
            )));
        }

        let bp = Breakpoint::method(self.allocate_id(), class_name, method_name, is_class_method);
        self.breakpoints.push(bp.clone());
        Ok(bp)
    }

    /// ブレークポイントを削除する
    pub fn remove(&mut self, id: BreakpointId) -> Result<Breakpoint> {
        let index = self
            .breakpoints
            .iter()
            .position(|bp| bp.id == id)
            .ok_or(DebugError::NotFound(id))?;
        Ok(self.breakpoints.remove(index))
    }

    /// ブレークポイントを取得する
    pub fn find(&self, id: BreakpointId) -> Result<&Breakpoint> {
        self.breakpoints
            .iter()
            .find(|bp| bp.id == id)
            .ok_or(DebugError::NotFound(id))
    }

    fn find_mut(&mut self, id: BreakpointId) -> Result<&mut Breakpoint> {
        self.breakpoints
            .iter_mut()
            .find(|bp| bp.id == id)
            .ok_or(DebugError::NotFound(id))
    }

    /// 停止条件を設定する（`None` で解除）
    pub fn set_condition(&mut self, id: BreakpointId, condition: Option<String>) -> Result<()> {
        self.find_mut(id)?.condition = condition;
        Ok(())
    }

    /// ブレークポイントを有効化・無効化する
    pub fn set_enabled(&mut self, id: BreakpointId, enabled: bool) -> Result<()> {
        self.find_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// 全てのブレークポイントを追加順に取得する
    pub fn all(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter()
    }

    /// 行ブレークポイントを取得する
    pub fn line_breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter().filter(|bp| bp.as_line().is_some())
    }

    /// メソッドブレークポイントを取得する
    pub fn method_breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter().filter(|bp| bp.as_method().is_some())
    }

    /// ブレークポイントの数を取得する
    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// 全て削除し、IDを0から振り直す
    pub fn clear(&mut self) {
        self.breakpoints.clear();
        self.next_id = 0;
    }
}

impl Default for BreakpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}
