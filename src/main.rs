#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::{path::PathBuf, rc::Rc, time::Duration};

    use clap::{value_parser, Arg, ArgMatches, Command};
    use cosmic_starfield::{
        host::PixelSurface, HostBindings, ManualScheduler, ManualViewportObserver,
        ManualVisibilityObserver, Starfield, StarfieldConfig, StarfieldError, Visibility,
    };
    use log::info;

    struct RunArgs {
        width: f32,
        height: f32,
        dpr: f32,
        config: StarfieldConfig,
        frames: u64,
        fps: f64,
        output: Option<PathBuf>,
        hide_at: Option<u64>,
        hide_for: u64,
    }

    impl RunArgs {
        /// Tick at which a simulated hidden page becomes visible again.
        fn show_at(&self) -> Option<u64> {
            self.hide_at.map(|at| at.saturating_add(self.hide_for))
        }
    }

    fn command() -> Command {
        Command::new("cosmic-starfield")
            .about("Runs the starfield against an off-screen buffer and snapshots the last frame")
            .arg(Arg::new("width").long("width").value_parser(value_parser!(f32)).default_value("800"))
            .arg(Arg::new("height").long("height").value_parser(value_parser!(f32)).default_value("600"))
            .arg(Arg::new("dpr").long("dpr").value_parser(value_parser!(f32)).default_value("1"))
            .arg(Arg::new("config").long("config").value_parser(value_parser!(PathBuf)).help("JSON starfield configuration"))
            .arg(Arg::new("stars").long("stars").value_parser(value_parser!(usize)))
            .arg(Arg::new("constellations").long("constellations").value_parser(value_parser!(usize)))
            .arg(Arg::new("speed").long("speed").value_parser(value_parser!(f32)))
            .arg(Arg::new("seed").long("seed").value_parser(value_parser!(u64)))
            .arg(Arg::new("frames").long("frames").value_parser(value_parser!(u64)).default_value("300"))
            .arg(Arg::new("fps").long("fps").value_parser(value_parser!(f64)).default_value("60"))
            .arg(Arg::new("output").long("output").short('o').value_parser(value_parser!(PathBuf)).help("Where to write the final frame (binary PPM)"))
            .arg(Arg::new("hide-at").long("hide-at").value_parser(value_parser!(u64)).help("Frame at which the page is reported hidden"))
            .arg(Arg::new("hide-for").long("hide-for").value_parser(value_parser!(u64)).default_value("60"))
    }

    fn run_args(matches: &ArgMatches) -> Result<RunArgs, StarfieldError> {
        let mut config = match matches.get_one::<PathBuf>("config") {
            Some(path) => StarfieldConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => StarfieldConfig::default(),
        };
        if let Some(stars) = matches.get_one::<usize>("stars") {
            config.star_count = *stars;
        }
        if let Some(constellations) = matches.get_one::<usize>("constellations") {
            config.constellation_count = *constellations;
        }
        if let Some(speed) = matches.get_one::<f32>("speed") {
            config.speed_multiplier = *speed;
        }
        if let Some(seed) = matches.get_one::<u64>("seed") {
            config.seed = Some(*seed);
        }
        config.validate()?;

        let fps = *matches.get_one::<f64>("fps").unwrap_or(&60.);
        if !(fps.is_finite() && fps > 0.) {
            return Err(StarfieldError::InvalidConfig(format!("fps must be positive, got {fps}")));
        }

        Ok(RunArgs {
            width: *matches.get_one::<f32>("width").unwrap_or(&800.),
            height: *matches.get_one::<f32>("height").unwrap_or(&600.),
            dpr: *matches.get_one::<f32>("dpr").unwrap_or(&1.),
            config,
            frames: *matches.get_one::<u64>("frames").unwrap_or(&300),
            fps,
            output: matches.get_one::<PathBuf>("output").cloned(),
            hide_at: matches.get_one::<u64>("hide-at").copied(),
            hide_for: *matches.get_one::<u64>("hide-for").unwrap_or(&60),
        })
    }

    async fn drive(
        starfield: &Starfield<PixelSurface>,
        scheduler: &ManualScheduler,
        visibility: &ManualVisibilityObserver,
        args: &RunArgs,
    ) {
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(1. / args.fps));
        let started = tokio::time::Instant::now();
        let show_at = args.show_at();

        starfield.start();
        for tick in 0..args.frames {
            ticker.tick().await;
            if args.hide_at == Some(tick) {
                visibility.notify(Visibility::Hidden);
            }
            if show_at == Some(tick) {
                visibility.notify(Visibility::Visible);
            }
            scheduler.fire(started.elapsed().as_secs_f64() * 1000.);
        }
    }

    pub fn main() -> Result<(), Box<dyn std::error::Error>> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let args = run_args(&command().get_matches())?;

        let scheduler = ManualScheduler::new();
        let resize = ManualViewportObserver::new();
        let visibility = ManualVisibilityObserver::new();
        let focus = ManualVisibilityObserver::new();
        let starfield = Starfield::new(
            PixelSurface::new(args.width, args.height, args.dpr),
            HostBindings {
                scheduler: Rc::new(scheduler.clone()),
                viewport: &resize,
                visibility: &visibility,
                focus: &focus,
            },
            args.config.clone(),
        )?;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(drive(&starfield, &scheduler, &visibility, &args));

        info!(
            "Rendered {} of {} ticks, final state {}",
            starfield.frame_count(),
            args.frames,
            starfield.state()
        );
        if let Some(output) = &args.output {
            starfield.surface().write_ppm(output)?;
        }
        starfield.destroy();
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn cli_overrides_config_defaults() {
            let matches = command().get_matches_from([
                "cosmic-starfield",
                "--stars",
                "12",
                "--speed",
                "2",
                "--seed",
                "4",
                "--hide-at",
                "10",
            ]);
            let args = run_args(&matches).unwrap();
            assert_eq!(args.config.star_count, 12);
            assert_eq!(args.config.speed_multiplier, 2.);
            assert_eq!(args.config.seed, Some(4));
            assert_eq!(args.hide_at, Some(10));
            assert_eq!(args.hide_for, 60);
            assert_eq!(args.width, 800.);
        }

        #[test]
        fn late_hide_does_not_overflow() {
            let max = u64::MAX.to_string();
            let matches = command().get_matches_from([
                "cosmic-starfield",
                "--hide-at",
                max.as_str(),
                "--hide-for",
                "10",
            ]);
            let args = run_args(&matches).unwrap();
            assert_eq!(args.show_at(), Some(u64::MAX));
        }

        #[test]
        fn rejects_non_positive_fps() {
            let matches = command().get_matches_from(["cosmic-starfield", "--fps", "0"]);
            assert!(run_args(&matches).is_err());
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    headless::main()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
