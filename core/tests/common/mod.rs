//! 集成测试共用：用 ffmpeg-next 生成小型测试视频

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::{Packet, Rational, codec, encoder, format, frame};

/// 测试视频参数
pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;
pub const FPS: i32 = 25;
pub const FRAMES: u32 = 50;
/// 关键帧间隔（帧）
pub const GOP: u32 = 5;

/// 第 `i` 帧的亮度值
#[must_use]
pub const fn luma_of(i: u32) -> u8 {
    (16 + i * 4) as u8
}

/// 当前进程专用的临时文件路径
#[must_use]
pub fn temp_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("lumaplay_test_{}_{name}", std::process::id()));
    path
}

/// 生成 MPEG-4 Part 2 编码的 Matroska 测试视频，每帧为单一亮度
pub fn write_test_clip(path: &Path) -> Result<(), ffmpeg::Error> {
    write_clip(path, None)
}

/// 同 [`write_test_clip`]，但第 `packet` 个数据包在起始码之后的负载被写成乱码，
/// 容器结构保持完整
pub fn write_damaged_clip(path: &Path, packet: u32) -> Result<(), ffmpeg::Error> {
    write_clip(path, Some(packet))
}

/// 待损坏的数据包序号与已写出的数据包数
struct Damage {
    target: Option<u32>,
    written: u32,
}

fn write_clip(path: &Path, damaged: Option<u32>) -> Result<(), ffmpeg::Error> {
    ffmpeg::init()?;
    let mut octx = format::output(&path)?;
    let codec = encoder::find(codec::Id::MPEG4).ok_or(ffmpeg::Error::EncoderNotFound)?;
    let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

    let encoder_time_base = Rational::new(1, FPS);
    let mut ost = octx.add_stream(codec)?;
    let mut video = codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()?;
    video.set_width(WIDTH);
    video.set_height(HEIGHT);
    video.set_format(Pixel::YUV420P);
    video.set_time_base(encoder_time_base);
    video.set_frame_rate(Some(Rational::new(FPS, 1)));
    video.set_gop(GOP);
    video.set_max_b_frames(0);
    if global_header {
        video.set_flags(codec::Flags::GLOBAL_HEADER);
    }
    let mut video = video.open_as(codec)?;
    ost.set_parameters(&video);
    ost.set_time_base(encoder_time_base);
    let stream_index = ost.index();

    octx.write_header()?;
    let stream_time_base = octx
        .stream(stream_index)
        .map_or(encoder_time_base, |s| s.time_base());
    let mut damage = Damage {
        target: damaged,
        written: 0,
    };

    for i in 0..FRAMES {
        let mut picture = frame::Video::new(Pixel::YUV420P, WIDTH, HEIGHT);
        picture.data_mut(0).fill(luma_of(i));
        picture.data_mut(1).fill(128);
        picture.data_mut(2).fill(128);
        picture.set_pts(Some(i64::from(i)));
        video.send_frame(&picture)?;
        drain(
            &mut video,
            &mut octx,
            &mut damage,
            stream_index,
            encoder_time_base,
            stream_time_base,
        )?;
    }
    video.send_eof()?;
    drain(
        &mut video,
        &mut octx,
        &mut damage,
        stream_index,
        encoder_time_base,
        stream_time_base,
    )?;
    octx.write_trailer()?;
    Ok(())
}

fn drain(
    video: &mut encoder::video::Encoder,
    octx: &mut format::context::Output,
    damage: &mut Damage,
    stream_index: usize,
    from: Rational,
    to: Rational,
) -> Result<(), ffmpeg::Error> {
    let mut packet = Packet::empty();
    while video.receive_packet(&mut packet).is_ok() {
        if damage.target == Some(damage.written) {
            if let Some(data) = packet.data_mut() {
                // 保留 4 字节 VOP 起始码
                for byte in data.iter_mut().skip(4) {
                    *byte = 0xA5;
                }
            }
        }
        damage.written += 1;
        packet.set_stream(stream_index);
        packet.rescale_ts(from, to);
        packet.write_interleaved(octx)?;
    }
    Ok(())
}
