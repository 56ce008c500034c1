use pixflow::channel::{ChannelPair, PacketSender};
use pixflow::error::ChannelError;
use pixflow::packet::BatchPacket;
use pixflow::pipeline::{PipelineContext, run_downstream, run_stages, run_upstream, run_wired};
use pixflow::stage::{Detail, Sharpen, Smooth, Transform};
use pixflow::{
    Grid, IntegrityAlgo, PipelineOpts, RunReport, StageKind, StageOutcome, TransportKind,
    sharpen_grid,
};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;

const ALL_KINDS: [TransportKind; 4] = [
    TransportKind::Queue,
    TransportKind::Pipe,
    TransportKind::Shm,
    TransportKind::Socket,
];

fn noisy(width: usize, height: usize) -> Grid {
    Grid::from_fn(width, height, |r, c| {
        [
            ((r * 131 + c * 71 + r * c * 17) % 256) as u8,
            ((r * 37 + c * 199) % 256) as u8,
            ((r * r * 3 + c * 5 + 90) % 256) as u8,
        ]
    })
}

/// Straightforward single-threaded sharpen over the interior.
fn oracle(g: &Grid, scale: u32) -> Grid {
    let mut out = g.clone();
    for r in 1..g.height() - 1 {
        for c in 1..g.width() - 1 {
            let mut px = [0u8; 3];
            for (ch, slot) in px.iter_mut().enumerate() {
                let mut sum = 0u32;
                for rr in r - 1..=r + 1 {
                    for cc in c - 1..=c + 1 {
                        sum += u32::from(g.channel(rr, cc, ch));
                    }
                }
                let smooth = (sum / 9) as u8;
                let orig = g.channel(r, c, ch);
                let detail = orig.saturating_sub(smooth);
                *slot = (u32::from(orig) + scale * u32::from(detail)).min(255) as u8;
            }
            out.set_pixel(r, c, px);
        }
    }
    out
}

fn opts(transport: TransportKind, batch_rows: usize, capacity: usize) -> PipelineOpts {
    PipelineOpts {
        batch_rows,
        capacity,
        transport,
        sink_transport: transport,
        ..PipelineOpts::default()
    }
}

fn context(grid: &Grid, opts: PipelineOpts) -> PipelineContext {
    PipelineContext::new(Arc::new(grid.clone()), opts).unwrap()
}

fn outcome_of<'a>(report: &'a RunReport, name: &str) -> &'a StageOutcome {
    &report
        .stages
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no stage {name}"))
        .outcome
}

fn row_bytes(g: &Grid, row: usize) -> &[u8] {
    let stride = g.width() * 3;
    &g.as_bytes()[row * stride..(row + 1) * stride]
}

/// Flips a payload byte of the batch starting at `target` before forwarding it.
struct CorruptingSender {
    inner: Box<dyn PacketSender>,
    target: i32,
}

impl PacketSender for CorruptingSender {
    fn push(&mut self, mut packet: BatchPacket) -> Result<(), ChannelError> {
        if !packet.is_terminal && packet.start_row == self.target {
            packet.payload[0] ^= 0xFF;
        }
        self.inner.push(packet)
    }

    fn transport(&self) -> TransportKind {
        self.inner.transport()
    }
}

/// Silently drops the batch starting at `target`.
struct DroppingSender {
    inner: Box<dyn PacketSender>,
    target: i32,
}

impl PacketSender for DroppingSender {
    fn push(&mut self, packet: BatchPacket) -> Result<(), ChannelError> {
        if !packet.is_terminal && packet.start_row == self.target {
            return Ok(());
        }
        self.inner.push(packet)
    }

    fn transport(&self) -> TransportKind {
        self.inner.transport()
    }
}

// --- transforms ---

#[test]
fn test_uniform_batch_transforms() {
    let grid = Grid::filled(5, 5, [10, 10, 10]);
    let input = BatchPacket::new(1, 3, 3);

    let smoothed = Smooth.apply(&input, &grid);
    assert!(smoothed.payload.iter().all(|&b| b == 10));

    let detail = Detail.apply(&smoothed, &grid);
    assert!(detail.payload.iter().all(|&b| b == 0));

    let sharp = Sharpen { scale: 2 }.apply(&detail, &grid);
    assert!(sharp.payload.iter().all(|&b| b == 10));
    assert_eq!(
        (sharp.start_row, sharp.row_count, sharp.cols_per_row),
        (1, 3, 3)
    );
}

#[test]
fn test_sharpen_clamps_at_255() {
    let grid = Grid::filled(3, 3, [200, 200, 200]);
    let mut detail = BatchPacket::new(1, 1, 1);
    detail.payload.copy_from_slice(&[100, 0, 1]);
    let out = Sharpen { scale: 2 }.apply(&detail, &grid);
    assert_eq!(out.payload, vec![255, 200, 202]);
}

#[test]
fn test_detail_floors_at_zero() {
    let grid = Grid::filled(3, 3, [5, 50, 0]);
    let mut smoothed = BatchPacket::new(1, 1, 1);
    smoothed.payload.copy_from_slice(&[9, 40, 0]);
    let out = Detail.apply(&smoothed, &grid);
    assert_eq!(out.payload, vec![0, 10, 0]);
}

// --- whole pipeline ---

#[test]
fn test_uniform_5x5_unchanged_every_transport() {
    let grid = Grid::filled(5, 5, [10, 10, 10]);
    for kind in ALL_KINDS {
        let (out, report) = sharpen_grid(&grid, &opts(kind, 1, 4)).unwrap();
        assert!(report.success(), "{kind}: {:?}", report.first_failure());
        assert_eq!(out, grid, "{kind}");
    }
}

#[test]
fn test_matches_oracle_every_transport_and_capacity() {
    let grid = noisy(17, 13);
    let expected = oracle(&grid, 2);
    for kind in ALL_KINDS {
        for capacity in [1, 512] {
            let (out, report) = sharpen_grid(&grid, &opts(kind, 4, capacity)).unwrap();
            assert!(report.success(), "{kind}/{capacity}");
            assert_eq!(out, expected, "{kind} with capacity {capacity}");
        }
    }
}

#[test]
fn test_batch_size_does_not_change_output() {
    let grid = noisy(9, 20);
    let expected = oracle(&grid, 2);
    for batch_rows in [1, 3, 7, 18, 100] {
        let (out, _) = sharpen_grid(&grid, &opts(TransportKind::Queue, batch_rows, 2)).unwrap();
        assert_eq!(out, expected, "batch_rows {batch_rows}");
    }
}

#[test]
fn test_mixed_link_transports() {
    let grid = noisy(11, 10);
    let mixed = PipelineOpts {
        batch_rows: 3,
        capacity: 1,
        links: vec![TransportKind::Pipe, TransportKind::Shm],
        sink_transport: TransportKind::Socket,
        integrity: IntegrityAlgo::Blake3,
        ..PipelineOpts::default()
    };
    let (out, report) = sharpen_grid(&grid, &mixed).unwrap();
    assert!(report.success());
    assert_eq!(
        report.links,
        vec![
            TransportKind::Pipe,
            TransportKind::Shm,
            TransportKind::Socket
        ]
    );
    assert_eq!(out, oracle(&grid, 2));
}

#[test]
fn test_integrity_off_same_output() {
    let grid = noisy(8, 8);
    let off = PipelineOpts {
        integrity: IntegrityAlgo::Off,
        ..opts(TransportKind::Pipe, 2, 2)
    };
    let (out, _) = sharpen_grid(&grid, &off).unwrap();
    assert_eq!(out, oracle(&grid, 2));
}

#[test]
fn test_scale_factor() {
    let grid = noisy(8, 8);
    let scaled = PipelineOpts {
        scale: 5,
        ..PipelineOpts::default()
    };
    let (out, _) = sharpen_grid(&grid, &scaled).unwrap();
    assert_eq!(out, oracle(&grid, 5));
}

#[test]
fn test_packet_counts_k_plus_one() {
    // 10 interior rows in batches of 3 -> 4 data packets.
    let grid = noisy(6, 12);
    for kind in ALL_KINDS {
        let (_, report) = sharpen_grid(&grid, &opts(kind, 3, 2)).unwrap();
        let stages = &report.stages;
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].packets_in, 0);
        for s in stages {
            assert_eq!(s.packets_out, 5, "{kind}: {} out", s.name);
        }
        for s in &stages[1..] {
            assert_eq!(s.packets_in, 5, "{kind}: {} in", s.name);
        }
        let sink = report.sink.as_ref().unwrap();
        assert_eq!(sink.batches_applied, 4);
        assert_eq!(sink.rows_applied, 10);
        assert!(sink.saw_terminal);
    }
}

#[test]
fn test_single_stage_chain_smooths() {
    let grid = noisy(7, 7);
    let ctx = context(&grid, opts(TransportKind::Shm, 2, 1));
    let run = run_stages(&ctx, &[StageKind::Smooth], None).unwrap();
    assert!(run.report.success());
    let mut expected = grid.clone();
    for r in 1..6 {
        for c in 1..6 {
            let mut px = [0u8; 3];
            for (ch, slot) in px.iter_mut().enumerate() {
                let mut sum = 0u32;
                for rr in r - 1..=r + 1 {
                    for cc in c - 1..=c + 1 {
                        sum += u32::from(grid.channel(rr, cc, ch));
                    }
                }
                *slot = (sum / 9) as u8;
            }
            expected.set_pixel(r, c, px);
        }
    }
    assert_eq!(run.output, expected);
}

// --- degenerate grids ---

#[test]
fn test_degenerate_grid_passes_through() {
    for (w, h) in [(2, 7), (7, 2), (1, 1), (0, 0)] {
        let grid = noisy(w, h);
        for kind in ALL_KINDS {
            let (out, report) = sharpen_grid(&grid, &opts(kind, 2, 2)).unwrap();
            assert_eq!(out, grid, "{w}x{h} over {kind}");
            assert!(report.success());
            for s in &report.stages {
                assert_eq!(s.packets_out, 1, "{} sends only the terminal", s.name);
            }
            assert_eq!(report.sink.as_ref().unwrap().batches_applied, 0);
        }
    }
}

#[test]
fn test_smallest_grid_with_interior() {
    let grid = noisy(3, 3);
    let (out, report) = sharpen_grid(&grid, &PipelineOpts::default()).unwrap();
    assert!(report.success());
    assert_eq!(out, oracle(&grid, 2));
}

// --- failures ---

#[test]
fn test_corruption_before_detail_stops_at_batch() {
    // Interior rows 1..13 in batches of 3: 1, 4, 7, 10.
    let grid = noisy(9, 14);
    let expected = oracle(&grid, 2);
    for kind in ALL_KINDS {
        let ctx = context(&grid, opts(kind, 3, 4));
        let mut links = ctx.open_links(&[kind, kind]).unwrap();
        let ChannelPair { tx, rx } = links.remove(0);
        links.insert(
            0,
            ChannelPair {
                tx: Box::new(CorruptingSender { inner: tx, target: 7 }),
                rx,
            },
        );
        let sink = ctx.open_sink_link().unwrap();
        let stages = ctx.build_stages(&StageKind::ALL);

        let run = run_wired(&ctx, stages, links, sink, None).unwrap();

        assert_eq!(
            outcome_of(&run.report, "detail"),
            &StageOutcome::Corrupted { start_row: 7 },
            "{kind}"
        );
        assert!(!run.report.success());
        let sink = run.report.sink.as_ref().unwrap();
        assert!(sink.saw_terminal, "{kind}: terminal still reaches the sink");
        assert_eq!(sink.batches_applied, 2);
        for row in 0..7 {
            assert_eq!(row_bytes(&run.output, row), row_bytes(&expected, row));
        }
        for row in 7..14 {
            assert_eq!(
                row_bytes(&run.output, row),
                row_bytes(&grid, row),
                "{kind}: row {row} must keep its input value"
            );
        }
    }
}

#[test]
fn test_sink_detects_corruption() {
    let grid = noisy(6, 10);
    let ctx = context(&grid, opts(TransportKind::Queue, 2, 8));
    let links = ctx.open_links(&[TransportKind::Queue, TransportKind::Queue]).unwrap();
    let ChannelPair { tx, rx } = ctx.open_sink_link().unwrap();
    let sink = ChannelPair {
        tx: Box::new(CorruptingSender { inner: tx, target: 5 }),
        rx,
    };
    let run = run_wired(&ctx, ctx.build_stages(&StageKind::ALL), links, sink, None).unwrap();

    let report = run.report.sink.as_ref().unwrap();
    assert_eq!(report.outcome, StageOutcome::Corrupted { start_row: 5 });
    assert_eq!(report.batches_applied, 2);
    assert_eq!(
        run.report.first_failure().map(|(who, _)| who),
        Some("sink".to_string())
    );
    for row in 5..10 {
        assert_eq!(row_bytes(&run.output, row), row_bytes(&grid, row));
    }
}

#[test]
fn test_missing_batch_is_malformed() {
    let grid = noisy(6, 10);
    let ctx = context(&grid, opts(TransportKind::Pipe, 2, 2));
    let mut links = ctx.open_links(&[TransportKind::Pipe, TransportKind::Pipe]).unwrap();
    let ChannelPair { tx, rx } = links.remove(1);
    links.push(ChannelPair {
        tx: Box::new(DroppingSender { inner: tx, target: 3 }),
        rx,
    });
    let sink = ctx.open_sink_link().unwrap();
    let run = run_wired(&ctx, ctx.build_stages(&StageKind::ALL), links, sink, None).unwrap();

    match outcome_of(&run.report, "sharpen") {
        StageOutcome::Malformed { start_row, .. } => assert_eq!(*start_row, 5),
        other => panic!("expected Malformed, got {:?}", other),
    }
    for row in 3..10 {
        assert_eq!(row_bytes(&run.output, row), row_bytes(&grid, row));
    }
}

#[test]
fn test_interrupt_before_first_batch() {
    let grid = noisy(8, 8);
    let ctx = context(&grid, PipelineOpts::default())
        .with_interrupt(Arc::new(AtomicBool::new(true)));
    let run = run_stages(&ctx, &StageKind::ALL, None).unwrap();
    assert_eq!(outcome_of(&run.report, "smooth"), &StageOutcome::Interrupted);
    assert_eq!(outcome_of(&run.report, "detail"), &StageOutcome::Completed);
    assert!(!run.report.success());
    assert_eq!(run.output, grid);
}

#[test]
fn test_config_errors() {
    let grid = noisy(5, 5);
    assert!(sharpen_grid(&grid, &opts(TransportKind::Queue, 0, 1)).is_err());
    assert!(sharpen_grid(&grid, &opts(TransportKind::Queue, 1, 0)).is_err());
    let bad_links = PipelineOpts {
        links: vec![TransportKind::Pipe],
        ..PipelineOpts::default()
    };
    assert!(sharpen_grid(&grid, &bad_links).is_err());
    let ctx = context(&grid, PipelineOpts::default());
    assert!(run_stages(&ctx, &[], None).is_err());
}

#[test]
fn test_report_serializes() {
    let grid = noisy(5, 6);
    let (_, report) = sharpen_grid(&grid, &PipelineOpts::default()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["width"], 5);
    assert_eq!(json["integrity"], "fnv1a");
    assert_eq!(json["stages"][0]["name"], "smooth");
    assert_eq!(json["stages"][2]["outcome"]["kind"], "completed");
    assert_eq!(json["sink"]["saw_terminal"], true);
}

// --- split deployment ---

struct SplitSide {
    split: usize,
    opts: PipelineOpts,
}

fn side(split: usize, opts: PipelineOpts) -> SplitSide {
    SplitSide { split, opts }
}

fn split_run(grid: &Grid, up: SplitSide, down: SplitSide) -> pixflow::Result<Grid> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let addr = listener.local_addr().unwrap();
    let up_grid = grid.clone();
    let up_split = up.split;
    let upstream = thread::spawn(move || {
        let ctx = context(&up_grid, up.opts);
        run_upstream(&ctx, &listener, up_split)
    });

    let ctx = context(grid, down.opts);
    let downstream = run_downstream(&ctx, addr, down.split, 20, None);
    let up_report = upstream.join().unwrap();
    let run = downstream?;
    let up_report = up_report?;
    assert!(up_report.sink.is_none());
    assert_eq!(up_report.stages.len(), up_split);
    assert_eq!(
        up_report.stages.len() + run.report.stages.len(),
        StageKind::ALL.len()
    );
    assert!(up_report.success() && run.report.success());
    Ok(run.output)
}

#[test]
fn test_split_over_socket_matches_local() {
    let grid = noisy(10, 9);
    let expected = oracle(&grid, 2);
    for split in 1..=3 {
        let o = opts(TransportKind::Shm, 2, 1);
        let out = split_run(&grid, side(split, o.clone()), side(split, o)).unwrap();
        assert_eq!(out, expected, "split after {split} stages");
    }
}

#[test]
fn test_split_rejects_mismatched_peer() {
    let grid = noisy(6, 6);
    let res = split_run(
        &grid,
        side(2, opts(TransportKind::Queue, 2, 2)),
        side(2, opts(TransportKind::Queue, 3, 2)),
    );
    assert!(res.is_err());
}

#[test]
fn test_split_rejects_mismatched_split() {
    let grid = noisy(10, 9);
    let o = PipelineOpts::default();
    let res = split_run(&grid, side(1, o.clone()), side(2, o));
    let err = res.err().expect("differing split points must not stream");
    assert!(format!("{err:#}").contains("split"), "{err:#}");
}

#[test]
fn test_split_point_out_of_range() {
    let grid = noisy(6, 6);
    let ctx = context(&grid, PipelineOpts::default());
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    assert!(run_upstream(&ctx, &listener, 0).is_err());
    assert!(run_upstream(&ctx, &listener, 4).is_err());
}
