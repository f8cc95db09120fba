//! 脚本化按键输入：`TICK:KEY` 表示在第 TICK 拍按下 KEY

use std::iter::Peekable;
use std::str::FromStr;
use std::vec::IntoIter;

use lumaplay::player::RawKeyCode;

/// 一次脚本化按键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedKey {
    /// 触发的拍数（从 0 开始）
    pub tick: u64,
    /// 按键代码
    pub key: RawKeyCode,
}

impl FromStr for ScriptedKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tick, key) = s
            .split_once(':')
            .ok_or_else(|| format!("期望 TICK:KEY，实际为 {s:?}"))?;
        let tick = tick
            .trim()
            .parse()
            .map_err(|e| format!("无效的拍数 {tick:?}: {e}"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("缺少按键代码: {s:?}"));
        }
        Ok(Self {
            tick,
            key: RawKeyCode(key.to_owned()),
        })
    }
}

/// 按拍数排序的按键队列
#[derive(Debug)]
pub struct Script {
    keys: Peekable<IntoIter<ScriptedKey>>,
}

impl Script {
    /// 排序（同一拍保持给出的顺序）后创建
    #[must_use]
    pub fn new(mut keys: Vec<ScriptedKey>) -> Self {
        keys.sort_by_key(|k| k.tick);
        Self {
            keys: keys.into_iter().peekable(),
        }
    }

    /// 取出一个已到期的按键
    pub fn next_due(&mut self, tick: u64) -> Option<RawKeyCode> {
        self.keys.next_if(|k| k.tick <= tick).map(|k| k.key)
    }

    /// 是否还有未触发的按键
    pub fn is_empty(&mut self) -> bool {
        self.keys.peek().is_none()
    }
}
