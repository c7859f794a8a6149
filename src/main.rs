use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use tracing::info;

use ft8ctrl::config::Document;
use ft8ctrl::dxcc::Dxcc;
use ft8ctrl::selector::Pipeline;
use ft8ctrl::sequencer::Sequencer;
use ft8ctrl::store::purge::Purge;
use ft8ctrl::store::{Store, Writer};
use ft8ctrl::{geo, logging};

#[derive(Debug, Parser)]
#[command(name = "ft8ctrl", version, about = "WSJT-X automation controller")]
struct Opt {
    /// Name of the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let opt = Opt::parse();
    match run(opt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ft8ctrl: {err}");
            ExitCode::FAILURE
        }
    }
}

// Startup stays synchronous: the prefix and registry refreshes use the
// blocking HTTP client, which must not run inside the async runtime. Only
// the sequencer itself lives on the runtime.
fn run(opt: Opt) -> ft8ctrl::Result {
    let document = Document::load(opt.config.as_deref())?;
    let controller = &document.ft8ctrl;
    logging::init(&controller.logfile_name, controller.logfile_size)?;

    info!("database: {}", controller.db_name.display());
    Store::create(&controller.db_name)?;

    let dxcc = Arc::new(Dxcc::load(&controller.dxcc_home())?);
    let origin = geo::grid_to_latlon(&controller.my_grid)?;

    let (queue, commands) = tokio::sync::mpsc::unbounded_channel();
    let writer = Writer::new(
        Store::open(&controller.db_name)?,
        commands,
        origin,
        dxcc.clone(),
    );
    thread::Builder::new()
        .name("db-writer".into())
        .spawn(move || writer.run())?;

    let purge = Purge::new(Store::open(&controller.db_name)?, controller.retry_time);
    thread::Builder::new()
        .name("purge".into())
        .spawn(move || purge.run())?;

    info!("call selector: {}", controller.call_selector.join(", "));
    let pipeline = Pipeline::from_config(&document, Store::open(&controller.db_name)?, dxcc)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let sequencer = Sequencer::new(controller, queue, pipeline).await?;
        tokio::select! {
            result = sequencer.run() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("^C pressed, exiting");
                Ok(())
            }
        }
    })
}
