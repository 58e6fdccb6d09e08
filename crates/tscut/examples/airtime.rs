use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

use tscut::filters::{AirtimeTracker, AirtimeTrackerOptions};
use tscut::psi::table::{EventId, ServiceId};
use tscut::sink::{feed_packets, JsonlEmitter};

#[derive(Debug)]
struct AppArgs {
    path: Option<PathBuf>,
    options: AirtimeTrackerOptions,
}

impl AppArgs {
    const HELP: &str = "\
対象番組の放送時間帯を1行1JSONで標準出力へ発行するコマンド

USAGE:
  airtime --sid SID --eid EID [PATH]

FLAGS:
  -h, --help    このヘルプを表示する
  --sid SID     対象のサービス識別
  --eid EID     対象のイベント識別

ARGS:
  <PATH>        入力のTSファイルのパス（省略時は標準入力）
";

    pub fn parse() -> Result<AppArgs, Box<dyn std::error::Error>> {
        let mut args = pico_args::Arguments::from_env();
        if args.contains(["-h", "--help"]) {
            print!("{}", Self::HELP);
            std::process::exit(0);
        }

        let sid: u16 = args.value_from_str("--sid")?;
        let eid: u16 = args.value_from_str("--eid")?;
        let path: Option<PathBuf> = args.opt_free_from_str()?;

        let options = AirtimeTrackerOptions {
            sid: ServiceId::new(sid).ok_or("SIDは0以外")?,
            eid: EventId::new(eid).ok_or("EIDは0以外")?,
        };

        Ok(AppArgs { path, options })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = AppArgs::parse()?;

    env_logger::init();

    let r: Box<dyn Read> = match &args.path {
        Some(path) => Box::new(BufReader::with_capacity(188 * 1024, File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };

    let emitter = JsonlEmitter::new(io::stdout().lock());
    let mut tracker = AirtimeTracker::new(args.options, emitter);
    feed_packets(r, &mut tracker)?;

    Ok(())
}
