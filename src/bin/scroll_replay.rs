use anyhow::Result;
use comet_stage::cli::ReplayArgs;
use comet_stage::scene::{HeadlessSurface, ManualScheduler};
use comet_stage::time::FrameClock;
use comet_stage::{DemoPage, Stage, StageConfig};
use glam::Vec2;

const FRAMES_PER_STEP: usize = 6;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("[scroll_replay] {err:?}");
        std::process::exit(2);
    }
}

fn run() -> Result<()> {
    let args = ReplayArgs::parse_from_env()?;
    let mut config = StageConfig::load_or_default(args.config_path());
    let overrides = args.config_overrides();
    if !overrides.is_empty() {
        log::info!("command line overrides: {}", overrides.applied_fields().join(", "));
        config.apply_overrides(&overrides);
    }
    let viewport = config.viewport_height();

    let mut stage = Stage::new(config);
    let page = DemoPage::layout(&mut stage);
    let scheduler = ManualScheduler::new();
    let surface = HeadlessSurface::new();
    let page_scope = stage.scope("page", |stage| {
        let seed = stage.mount_scene(Box::new(scheduler.clone()), Box::new(surface.clone()));
        log::info!("scene seed {seed}");
        page.wire(stage)
    });

    let mut clock = FrameClock::fixed(1.0 / 60.0);
    let bottom = page.max_scroll(viewport);
    let step = args.step();
    let mut offsets = Vec::new();
    let mut offset = 0.0_f32;
    while offset < bottom {
        offsets.push(offset);
        offset += step;
    }
    offsets.push(bottom);
    let descent = offsets.clone();
    offsets.extend(descent.into_iter().rev().skip(1));

    print_events(&mut stage, 0.0);
    for (index, offset) in offsets.iter().enumerate() {
        let sweep = (index as f32 * 0.05).sin();
        stage.set_pointer(Vec2::new(sweep, sweep * 0.5));
        stage.scroll_to(*offset);
        for _ in 0..FRAMES_PER_STEP {
            stage.frame(clock.tick());
        }
        print_events(&mut stage, *offset);
    }

    if let Some(driver) = stage.scene() {
        println!(
            "scene: {} frames, {} instances, layer opacity {:.2}",
            driver.frame_index(),
            driver.instances().len(),
            surface.last_layer_opacity()
        );
        for summary in driver.profiler_summaries() {
            println!("  {:<24} last {:.3} ms", summary.name, summary.last_ms);
        }
    }
    page_scope.dispose(&mut stage);
    print_events(&mut stage, 0.0);
    println!(
        "disposed: {} triggers, {} timelines left; {} frame requests pending",
        stage.triggers().len(),
        stage.timelines().len(),
        scheduler.pending()
    );
    Ok(())
}

fn print_events(stage: &mut Stage, offset: f32) {
    for event in stage.drain_events() {
        println!("[{offset:>7.1}] {event}");
    }
}
