use std::{error::Error, path::PathBuf, thread};

use clap::{Parser, Subcommand};
use clock_alert::{
    audio,
    client::Client,
    config::{AlarmFile, Config},
    protocol::{ClientMessage, ServerMessage},
    server::{self, Server},
    AlarmClock, AlarmView, SystemClock,
};
use log::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// config file to use instead of the one in the platform config dir
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// write a default config file
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// run the alarm daemon in the foreground
    Daemon,
    #[command(flatten)]
    Request(Request),
}

/// commands sent to a running daemon
#[derive(Subcommand)]
enum Request {
    /// add an alarm, time as HH:MM:SS
    Add { time: String },
    Remove { id: u64 },
    List,
    /// silence the ringing alarm
    Stop,
    /// print alarm events as they happen
    Watch,
    /// stop the daemon
    Shutdown,
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    simple_file_logger::init_logger!("clock_alert").expect("couldn't initialize logger");

    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => Config::config_path()?,
    };

    match args.command {
        Command::Init { force } => {
            if force || !config_path.exists() {
                Config::new().save(&config_path)?;
                println!("wrote {}", config_path.display());
            } else {
                println!("{} already exists, use --force to overwrite", config_path.display());
            }
            Ok(())
        }
        Command::Daemon => run_daemon(&Config::load(&config_path)?),
        Command::Request(request) => run_client(&Config::load(&config_path)?, request),
    }
}

fn run_daemon(config: &Config) -> Result<(), Box<dyn Error>> {
    let clock = AlarmClock::open(AlarmFile::new(Config::alarms_path()?))?;

    let (_, events) = clock.subscribe();
    audio::spawn_player(events, config.sound.clone(), config.gain())?;
    let scheduler = clock
        .scheduler(SystemClock)
        .spawn(config.tick_interval())?;

    let listener = server::bind(&config.socket_name)?;
    let (shutdown, shutdown_rx) = crossbeam_channel::bounded(1);
    let server = Server::new(clock.clone(), shutdown);
    thread::Builder::new()
        .name("alarm-server".to_string())
        .spawn(move || server.run(&listener))?;
    println!("daemon running at {}", config.socket_name);

    // every sender lives in the server thread, so this only returns on request
    let _ = shutdown_rx.recv();
    scheduler.shutdown();
    clock.stop_alarm();
    info!("daemon stopped");
    Ok(())
}

fn run_client(config: &Config, request: Request) -> Result<(), Box<dyn Error>> {
    let mut client = Client::connect(&config.socket_name)?;
    let message = match request {
        Request::Add { time } => ClientMessage::AddAlarm(time),
        Request::Remove { id } => ClientMessage::RemoveAlarm(id),
        Request::List => ClientMessage::ListAlarms,
        Request::Stop => ClientMessage::StopAlarm,
        Request::Watch => ClientMessage::Subscribe,
        Request::Shutdown => ClientMessage::Shutdown,
    };
    match client.request(&message)? {
        ServerMessage::Alarms(alarms) => print_alarms(&alarms),
        ServerMessage::Stopped(id) => println!("stopped alarm {id}"),
        ServerMessage::NothingRinging => println!("no alarm is ringing"),
        ServerMessage::ShuttingDown => println!("daemon is shutting down"),
        ServerMessage::Subscribed => loop {
            match client.next_message()? {
                ServerMessage::AlarmTriggered(id) => println!("alarm {id} triggered"),
                ServerMessage::AlarmStopped(id) => println!("alarm {id} stopped"),
                other => println!("{other:?}"),
            }
        },
        other => println!("unexpected reply: {other:?}"),
    }
    Ok(())
}

fn print_alarms(alarms: &[AlarmView]) {
    if alarms.is_empty() {
        println!("no alarms");
    }
    for alarm in alarms {
        println!("{:>4}  {}", alarm.id, alarm.time);
    }
}
