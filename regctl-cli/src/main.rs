//! A thin operator CLI over the driver's high-level API: connect to a
//! running device simulator, inspect its state, and actuate it from the
//! command line.

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use regctl_driver::DriverSession;
use regctl_protocol::Component;

#[derive(Debug, Parser)]
#[command(name = "regctl-cli", version, about)]
struct Args {
    /// Host the device simulator is listening on.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port the device simulator is listening on.
    #[arg(long, default_value_t = 8989)]
    port: u16,

    /// Send/receive timeout in milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print connected/power/error status.
    Status,
    GetTemperature,
    GetHumidity,
    GetLed,
    SetLed { value: String },
    GetFan,
    SetFan { value: String },
    GetHeater,
    SetHeater { value: String },
    /// Print whether a door is open or closed.
    DoorState { id: u8 },
    SetDoor {
        id: u8,
        #[arg(value_enum)]
        state: DoorState,
    },
    Power {
        #[arg(value_enum)]
        component: ComponentArg,
        #[arg(value_enum)]
        state: PowerState,
    },
    Reset {
        #[arg(value_enum)]
        component: ComponentArg,
    },
    /// Send a raw six-hex-digit frame and print the response frame.
    Raw { frame: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DoorState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PowerState {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ComponentArg {
    Temperature,
    Humidity,
    Led,
    Fan,
    Heater,
    Doors,
}

impl From<ComponentArg> for Component {
    fn from(value: ComponentArg) -> Self {
        match value {
            ComponentArg::Temperature => Component::Temperature,
            ComponentArg::Humidity => Component::Humidity,
            ComponentArg::Led => Component::Led,
            ComponentArg::Fan => Component::Fan,
            ComponentArg::Heater => Component::Heater,
            ComponentArg::Doors => Component::Doors,
        }
    }
}

fn parse_u8(s: &str) -> anyhow::Result<u8> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).context("value must be a hex byte after 0x")
    } else {
        s.parse::<u8>().context("value must be a decimal byte 0..=255")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let session = DriverSession::new(None);
    session.set_timeout(args.timeout_ms).await.ok();
    session
        .connect(&args.host, args.port)
        .await
        .map_err(|err| anyhow::anyhow!("connect to {}:{} failed: {err}", args.host, args.port))?;

    let result = run(&session, args.command).await;

    session.disconnect().await.ok();
    result
}

async fn run(session: &DriverSession, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Status => {
            let status = session
                .get_status()
                .await
                .map_err(|err| anyhow::anyhow!("{err}"))?;
            println!("{status:?}");
        }
        Command::GetTemperature => {
            let v = session.get_temperature().await.map_err(|err| anyhow::anyhow!("{err}"))?;
            println!("{v}");
        }
        Command::GetHumidity => {
            let v = session.get_humidity().await.map_err(|err| anyhow::anyhow!("{err}"))?;
            println!("{v}");
        }
        Command::GetLed => {
            let v = session.get_led().await.map_err(|err| anyhow::anyhow!("{err}"))?;
            println!("{v:#04X}");
        }
        Command::SetLed { value } => {
            session
                .set_led(parse_u8(&value)?)
                .await
                .map_err(|err| anyhow::anyhow!("{err}"))?;
        }
        Command::GetFan => {
            let v = session.get_fan().await.map_err(|err| anyhow::anyhow!("{err}"))?;
            println!("{v:#04X}");
        }
        Command::SetFan { value } => {
            session
                .set_fan(parse_u8(&value)?)
                .await
                .map_err(|err| anyhow::anyhow!("{err}"))?;
        }
        Command::GetHeater => {
            let v = session.get_heater().await.map_err(|err| anyhow::anyhow!("{err}"))?;
            println!("{v:#04X}");
        }
        Command::SetHeater { value } => {
            session
                .set_heater(parse_u8(&value)?)
                .await
                .map_err(|err| anyhow::anyhow!("{err}"))?;
        }
        Command::DoorState { id } => {
            let open = session.get_door_state(id).await.map_err(|err| anyhow::anyhow!("{err}"))?;
            println!("{}", if open { "open" } else { "closed" });
        }
        Command::SetDoor { id, state } => {
            session
                .set_door(id, matches!(state, DoorState::Open))
                .await
                .map_err(|err| anyhow::anyhow!("{err}"))?;
        }
        Command::Power { component, state } => {
            session
                .set_power_state(component.into(), matches!(state, PowerState::On))
                .await
                .map_err(|err| anyhow::anyhow!("{err}"))?;
        }
        Command::Reset { component } => {
            session
                .reset_component(component.into())
                .await
                .map_err(|err| anyhow::anyhow!("{err}"))?;
        }
        Command::Raw { frame } => {
            let response = session.send_raw(&frame).await.map_err(|err| anyhow::anyhow!("{err}"))?;
            println!("{response}");
        }
    }
    Ok(())
}
