use std::path::PathBuf;

pub(crate) const DEFAULT_FPS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CliOptions {
    pub(crate) script_path: PathBuf,
    pub(crate) realtime: bool,
    pub(crate) fps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    Run(CliOptions),
    Help,
}

pub(crate) fn parse_args(args: &[String]) -> Result<CliCommand, String> {
    if args.is_empty() {
        return Err(usage_text());
    }

    let mut realtime = false;
    let mut fps = DEFAULT_FPS;
    let mut script_path = None;
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "--realtime" => {
                realtime = true;
                index += 1;
            }
            "--fps" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --fps".to_string())?;
                fps = value
                    .parse::<u32>()
                    .ok()
                    .filter(|fps| *fps > 0)
                    .ok_or_else(|| format!("invalid --fps value '{value}' (expected u32 > 0)"))?;
                index += 2;
            }
            flag if flag.starts_with('-') => {
                return Err(format!("unknown option '{flag}'"));
            }
            path => {
                if script_path.is_some() {
                    return Err(format!("unexpected extra argument '{path}'"));
                }
                script_path = Some(PathBuf::from(path));
                index += 1;
            }
        }
    }

    let script_path = script_path.ok_or_else(|| "missing script path".to_string())?;
    Ok(CliCommand::Run(CliOptions {
        script_path,
        realtime,
        fps,
    }))
}

pub(crate) fn usage_text() -> String {
    [
        "flow_host - headless scrolling chat overlay driver",
        "",
        "Usage:",
        "  flow_host [--realtime] [--fps <u32>] <script.jsonl>",
        "  flow_host -h | --help",
        "",
        "Defaults:",
        "  --fps 60",
        "",
        "Environment:",
        "  FLOWCHAT_SETTINGS  settings file (default ./flowchat.settings.json)",
        "  RUST_LOG           log filter (default info)",
    ]
    .join("\n")
}
