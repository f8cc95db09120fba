//! 按键映射：把平台无关的按键代码转换为播放控制命令

use std::collections::HashMap;

use super::PlayerCommand;
use crate::config::Settings;

/// 平台无关的按键代码（如 `"Space"`、`"Digit1"`）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawKeyCode(pub String);

impl From<&str> for RawKeyCode {
    fn from(code: &str) -> Self {
        Self(code.to_owned())
    }
}

/// 按键映射器
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    map: HashMap<String, PlayerCommand>,
}

impl KeyMap {
    /// 从 `(按键代码, 命令)` 列表创建映射器，后出现的绑定覆盖先出现的
    #[must_use]
    pub fn new(bindings: impl IntoIterator<Item = (String, PlayerCommand)>) -> Self {
        Self {
            map: bindings.into_iter().collect(),
        }
    }

    /// 按配置中的按键绑定与滤镜槽位创建映射器
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let keys = &settings.keys;
        let groups = [
            (&keys.toggle_pause, PlayerCommand::TogglePause),
            (&keys.seek_backward, PlayerCommand::SeekBackward),
            (&keys.seek_forward, PlayerCommand::SeekForward),
            (&keys.restart, PlayerCommand::Restart),
            (&keys.quit, PlayerCommand::Quit),
            (&keys.step_forward, PlayerCommand::StepForward),
            (&keys.step_backward, PlayerCommand::StepBackward),
            (&keys.clear_filters, PlayerCommand::ClearFilters),
        ];
        let fixed = groups
            .into_iter()
            .flat_map(|(codes, command)| codes.iter().map(move |c| (c.clone(), command)));
        let slots = settings
            .filters
            .iter()
            .map(|slot| (slot.key_code(), PlayerCommand::ToggleFilter(slot.slot)));
        Self::new(fixed.chain(slots))
    }

    /// 查找按键对应的命令
    #[must_use]
    pub fn convert(&self, code: &RawKeyCode) -> Option<PlayerCommand> {
        self.map.get(&code.0).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let key_map = KeyMap::from_settings(&Settings::default());
        assert_eq!(
            key_map.convert(&"Space".into()),
            Some(PlayerCommand::TogglePause)
        );
        assert_eq!(
            key_map.convert(&"ArrowLeft".into()),
            Some(PlayerCommand::SeekBackward)
        );
        assert_eq!(
            key_map.convert(&"Digit5".into()),
            Some(PlayerCommand::ToggleFilter(5))
        );
        assert_eq!(
            key_map.convert(&"Digit0".into()),
            Some(PlayerCommand::ClearFilters)
        );
        assert_eq!(key_map.convert(&"KeyZ".into()), None);
    }

    #[test]
    fn test_later_binding_wins() {
        let key_map = KeyMap::new([
            ("KeyA".to_owned(), PlayerCommand::Quit),
            ("KeyA".to_owned(), PlayerCommand::Restart),
        ]);
        assert_eq!(key_map.convert(&"KeyA".into()), Some(PlayerCommand::Restart));
    }
}
