use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    data_dir: Option<PathBuf>,
    verbose: bool,
    silent: bool,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let root = match args.data_dir {
        Some(dir) => dir,
        None => spotipai::config::data_root()?,
    };
    log::debug!("data directory: {}", root.display());

    let mut library = spotipai::library::Library::open(&root)?;
    library.init_default_data();

    let device: Box<dyn spotipai::audio::PlaybackDevice> = if args.silent {
        Box::new(spotipai::audio::NullDevice::new())
    } else {
        spotipai::audio::open_default_device()
    };
    log::info!("audio output: {}", device.output_name());

    spotipai::console::run(spotipai::console::Console::new(library, device))
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--verbose" | "-v" => out.verbose = true,
            "--silent" => out.silent = true,
            "--data-dir" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--data-dir requires a directory");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--data-dir cannot be empty");
                }
                out.data_dir = Some(PathBuf::from(value.trim()));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("spotipai");
    println!("  --data-dir DIR    Where songs.json and users.json live");
    println!("  --silent          Do not open an audio output");
    println!("  -v, --verbose     Debug logging");
}
