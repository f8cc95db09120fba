//! # lumaplay 命令行前端
//!
//! 打开视频、按配置注册滤镜槽位，然后在无窗口模式下驱动播放器。
//! 键盘输入由 `--commands` 脚本代替。

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lumaplay::config::{self, Settings};
use lumaplay::filters::{FilterBackend, LavfiBackend, PixelBackend};
use lumaplay::player::{KeyMap, Pacer, Player, TickOutcome};
use lumaplay::{DecodeEngine, VideoDecoder, logging};
use tracing::{info, warn};

mod script;
mod sink;

use script::{Script, ScriptedKey};
use sink::HeadlessSink;

/// 滤镜后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// libavfilter 滤镜图
    Lavfi,
    /// 直接操作像素缓冲区
    Pixel,
}

#[derive(Debug, Parser)]
#[command(name = "lumaplay-cli", version, about = "无窗口视频播放器")]
struct ExecArgs {
    /// 视频文件
    path: PathBuf,
    /// 配置文件（TOML），不存在时使用默认配置
    #[arg(long, default_value = "lumaplay.toml")]
    config: PathBuf,
    /// 启动时启用的滤镜标识符，可重复
    #[arg(long = "filter")]
    filters: Vec<String>,
    /// 起始位置（秒）
    #[arg(long)]
    start: Option<f64>,
    /// 最多显示的帧数
    #[arg(long)]
    max_frames: Option<u64>,
    /// 结束时把最后一帧保存为 PNG
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// 按帧率实时播放，否则尽快解码
    #[arg(long)]
    realtime: bool,
    /// 滤镜后端
    #[arg(long, value_enum, default_value_t = Backend::Lavfi)]
    backend: Backend,
    /// 脚本化按键，逗号分隔的 `TICK:KEY`（如 `10:Digit5,40:Space`）
    #[arg(long, value_delimiter = ',')]
    commands: Vec<ScriptedKey>,
}

fn main() -> Result<()> {
    let args = ExecArgs::parse();
    logging::init_logging(logging::DEFAULT_DIRECTIVE);

    let settings = config::load_settings_or_default(&args.config)?;
    let engine = DecodeEngine::open(&args.path)
        .with_context(|| format!("无法打开视频: {}", args.path.display()))?;
    info!(
        stream = engine.stream_index(),
        time_base = %engine.time_base(),
        width = engine.width(),
        height = engine.height(),
        duration = engine.duration(),
        "已打开 {}",
        args.path.display()
    );

    match args.backend {
        Backend::Lavfi => run(&args, &settings, engine, LavfiBackend::new()?),
        Backend::Pixel => run(&args, &settings, engine, PixelBackend::new()),
    }
}

fn run<B: FilterBackend>(
    args: &ExecArgs,
    settings: &Settings,
    engine: DecodeEngine,
    backend: B,
) -> Result<()> {
    let key_map = KeyMap::from_settings(settings);
    let mut player = Player::new(engine, backend, settings);

    let registered = player.filters().list_registered();
    for id in &args.filters {
        player
            .filters_mut()
            .activate_filter(id)
            .with_context(|| format!("启用滤镜 {id} 失败，可用滤镜: {registered:?}"))?;
    }
    if let Some(start) = args.start {
        player.seek(start);
    }

    let mut sink = HeadlessSink::new(args.snapshot.is_some());
    let mut script = Script::new(args.commands.clone());
    let mut pacer = Pacer::new(player.frame_delay());
    let mut tick: u64 = 0;
    loop {
        while let Some(key) = script.next_due(tick) {
            match key_map.convert(&key) {
                Some(command) => player.handle(command, &mut sink),
                None => warn!("未绑定的按键: {}", key.0),
            }
        }
        let outcome = player.tick(&mut sink);
        let idle = script.is_empty();
        match outcome {
            TickOutcome::Presented => {}
            // 暂停或播完后只等待剩余的脚本按键
            TickOutcome::Paused | TickOutcome::Finished if idle => break,
            TickOutcome::Paused | TickOutcome::Finished => {}
            TickOutcome::Quit => break,
        }
        if args.max_frames.is_some_and(|max| sink.presented() >= max) {
            break;
        }
        tick += 1;
        if args.realtime {
            pacer.wait();
        }
    }

    info!(
        frames = sink.presented(),
        decoded = player.decoder().frames_decoded(),
        position = player.position(),
        filters = ?player.filters().list_active(),
        "播放结束"
    );
    if let Some(path) = &args.snapshot {
        sink.save_snapshot(path)?;
        info!("截图已保存: {}", path.display());
    }
    Ok(())
}
