use lumaplay::filters::{
    FilterBackend, FilterGraphManager, FilterOutcome, FlipAxis, GraphParams, LavfiBackend,
    MirrorKind, PixelBackend,
};
use lumaplay::{Filter, PixelFormat, VideoFrame};

/// 左上、右上、左下、右下四个象限的亮度
const QUADRANTS: [u8; 4] = [40, 80, 120, 160];

/// 四象限测试图案
fn quadrant_pattern(size: u32) -> VideoFrame {
    let mut frame = VideoFrame::new(PixelFormat::Yuv420p, size, size);
    let half = size / 2;
    let luma = frame.plane_mut(0);
    for y in 0..size {
        for x in 0..size {
            let index = usize::from(x >= half) + 2 * usize::from(y >= half);
            luma.pixel_mut(x, y)[0] = QUADRANTS[index];
        }
    }
    frame
}

/// 四分屏后 4×4 个色块的期望亮度（行优先）
///
/// 每格是整幅图案的缩小副本：左上 hflip，右上原样，左下 vflip，右下 hflip + vflip
fn expected_mosaic() -> [[u8; 4]; 4] {
    let [tl, tr, bl, br] = QUADRANTS;
    [
        [tr, tl, tl, tr],
        [br, bl, bl, br],
        [bl, br, br, bl],
        [tl, tr, tr, tl],
    ]
}

/// 读取每个色块中心的亮度
fn sample_blocks(frame: &VideoFrame) -> [[u8; 4]; 4] {
    let block = frame.width() / 4;
    let mut out = [[0; 4]; 4];
    for (by, row) in out.iter_mut().enumerate() {
        for (bx, value) in row.iter_mut().enumerate() {
            let x = bx as u32 * block + block / 2;
            let y = by as u32 * block + block / 2;
            *value = frame.plane(0).pixel(x, y)[0];
        }
    }
    out
}

fn params(size: u32) -> GraphParams {
    GraphParams {
        width: size,
        height: size,
        format: PixelFormat::Yuv420p,
    }
}

/// 注册、启用、停用后对测试图案应用滤镜
fn run_scenario<B: FilterBackend>(backend: B, size: u32) -> VideoFrame {
    let mut manager = FilterGraphManager::new(backend, params(size));
    manager.register_filter(Filter::Flip(FlipAxis::Vertical));
    manager.register_filter(Filter::Mirror(MirrorKind::Quad));

    manager.activate_filter("vflip").unwrap();
    assert_eq!(manager.list_active(), ["vflip"]);
    manager.activate_filter("quadmirror").unwrap();
    assert_eq!(manager.list_active(), ["vflip", "quadmirror"]);
    manager.deactivate_filter("vflip").unwrap();
    assert_eq!(manager.list_active(), ["quadmirror"]);
    assert!(manager.is_built());

    let mut input = quadrant_pattern(size);
    input.set_timestamps(Some(4000), Some(3960), 4.0);
    match manager.apply(input) {
        FilterOutcome::Replaced(frame) => {
            assert_eq!(frame.pts(), Some(4000));
            assert_eq!(frame.dts(), Some(3960));
            assert!((frame.time() - 4.0).abs() < f64::EPSILON);
            frame
        }
        FilterOutcome::Unchanged(_) => panic!("滤镜图没有生效"),
    }
}

#[test]
fn quad_mirror_mosaic_on_pixel_backend() {
    let out = run_scenario(PixelBackend::new(), 16);
    assert_eq!((out.width(), out.height()), (16, 16));
    assert_eq!(sample_blocks(&out), expected_mosaic());
}

#[test]
fn quad_mirror_mosaic_on_lavfi_backend() {
    let out = run_scenario(LavfiBackend::new().unwrap(), 64);
    assert_eq!((out.width(), out.height()), (64, 64));
    let got = sample_blocks(&out);
    for (got_row, want_row) in got.iter().zip(expected_mosaic().iter()) {
        for (g, w) in got_row.iter().zip(want_row.iter()) {
            assert!(g.abs_diff(*w) <= 3, "got {got:?}");
        }
    }
}

#[test]
fn activation_order_changes_the_result() {
    let mut a = FilterGraphManager::new(PixelBackend::new(), params(16));
    let mut b = FilterGraphManager::new(PixelBackend::new(), params(16));
    for m in [&mut a, &mut b] {
        m.register_filter(Filter::Flip(FlipAxis::Vertical));
        m.register_filter(Filter::Mirror(MirrorKind::Quad));
    }
    a.activate_filter("vflip").unwrap();
    a.activate_filter("quadmirror").unwrap();
    b.activate_filter("quadmirror").unwrap();
    b.activate_filter("vflip").unwrap();
    assert_ne!(a.description(), b.description());

    let out_a = a.apply(quadrant_pattern(16)).into_frame();
    let out_b = b.apply(quadrant_pattern(16)).into_frame();
    assert_ne!(sample_blocks(&out_a), sample_blocks(&out_b));
}

#[test]
fn lavfi_accepts_repeated_mirrors_in_one_chain() {
    let mut manager = FilterGraphManager::new(LavfiBackend::new().unwrap(), params(32));
    for filter in [
        Filter::Mirror(MirrorKind::Horizontal),
        Filter::Mirror(MirrorKind::Vertical),
        Filter::grayscale(0.5),
        Filter::grayscale(1.0),
    ] {
        manager.register_filter(filter);
    }
    for id in ["hmirror", "vmirror", "gray0.500000", "gray1.000000"] {
        manager.activate_filter(id).unwrap();
    }
    assert!(manager.is_built());
    let out = manager.apply(quadrant_pattern(32));
    assert!(out.is_replaced());
    let frame = out.frame();
    assert_eq!(frame.format(), PixelFormat::Yuv420p);
    // 完全去色后色度为中性值
    let chroma = frame.plane(1).pixel(3, 3)[0];
    assert!(chroma.abs_diff(128) <= 1);
}

#[test]
fn passthrough_after_clearing_keeps_the_same_buffer() {
    let mut manager = FilterGraphManager::new(PixelBackend::new(), params(16));
    manager.register_filter(Filter::Flip(FlipAxis::Horizontal));
    manager.activate_filter("hflip").unwrap();
    manager.deactivate_all();

    let input = quadrant_pattern(16);
    let ptr = input.plane(0).data().as_ptr();
    let FilterOutcome::Unchanged(out) = manager.apply(input) else {
        panic!("直通状态下不应产生新帧");
    };
    assert_eq!(out.plane(0).data().as_ptr(), ptr);
}
