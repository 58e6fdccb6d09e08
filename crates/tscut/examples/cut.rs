use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::PathBuf;

use tscut::clock::PcrClock;
use tscut::filters::{ProgramFilter, ProgramFilterOptions};
use tscut::psi::table::{EventId, ServiceId};
use tscut::sink::{feed_packets, WriteSink};

#[derive(Debug)]
struct AppArgs {
    path: Option<PathBuf>,
    options: ProgramFilterOptions,
}

impl AppArgs {
    const HELP: &str = "\
単一サービスのTSから対象番組の時間帯だけを標準出力へ切り出すコマンド

USAGE:
  cut --sid SID --eid EID --clock-pcr PCR --clock-time TIME [OPTIONS] [PATH]

FLAGS:
  -h, --help           このヘルプを表示する
  --sid SID            対象のサービス識別
  --eid EID            対象のイベント識別
  --clock-pcr PCR      基準時刻におけるPCR値（27MHzティック）
  --clock-time TIME    基準の壁時計（日本標準時、例：1982-09-06T12:34:56）
  --start-margin MS    番組開始より手前に取る余裕（ミリ秒、既定値0）
  --end-margin MS      番組終了より後ろに取る余裕（ミリ秒、既定値0）
  --pre-streaming      開始PCRを待たずにPATを送出する

ARGS:
  <PATH>               入力のTSファイルのパス（省略時は標準入力）
";

    pub fn parse() -> Result<AppArgs, Box<dyn std::error::Error>> {
        let mut args = pico_args::Arguments::from_env();
        if args.contains(["-h", "--help"]) {
            print!("{}", Self::HELP);
            std::process::exit(0);
        }

        let sid: u16 = args.value_from_str("--sid")?;
        let eid: u16 = args.value_from_str("--eid")?;
        let clock_pcr: i64 = args.value_from_str("--clock-pcr")?;
        let clock_time: chrono::NaiveDateTime = args.value_from_str("--clock-time")?;
        let start_margin: i64 = args.opt_value_from_str("--start-margin")?.unwrap_or(0);
        let end_margin: i64 = args.opt_value_from_str("--end-margin")?.unwrap_or(0);
        let pre_streaming = args.contains("--pre-streaming");
        let path: Option<PathBuf> = args.opt_free_from_str()?;

        let options = ProgramFilterOptions {
            sid: ServiceId::new(sid).ok_or("SIDは0以外")?,
            eid: EventId::new(eid).ok_or("EIDは0以外")?,
            clock: PcrClock::new(clock_time, clock_pcr),
            start_margin: chrono::Duration::milliseconds(start_margin),
            end_margin: chrono::Duration::milliseconds(end_margin),
            pre_streaming,
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

    let sink = WriteSink::new(BufWriter::new(io::stdout().lock()));
    let mut filter = ProgramFilter::new(args.options, sink);
    feed_packets(r, &mut filter)?;

    Ok(())
}
