//! MSI GT660 LED controller CLI tool
//!
//! Controls the back, side and front LEDs of MSI GT660 notebooks through the
//! USB LED controller found at 1770:ff00.

use clap::{
    crate_description, crate_name, crate_version, Arg, ArgAction, ArgMatches, Command, ValueEnum,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use gtlm::controller::ControlTransport;
use gtlm::device::{LedController, OpenOptions};
use gtlm::error::{Error, Result};
use gtlm::msi_gt660::{Leds, Mode, EXPECTED_VERSION};
use gtlm::settings::{Settings, SettingsError, SettingsStore};

const TOGGLE_VALUES: &str = "'on' or 'off'";
const MODE_VALUES: &str = "'blink', 'audio', 'breath', 'demo' or 'always'";

/// LED group state argument.
#[derive(ValueEnum, PartialEq, Eq, Debug, Copy, Clone)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn is_on(self) -> bool {
        self == Self::On
    }
}

/// Requested changes.
#[derive(Default, Debug)]
struct Options {
    status: bool,
    force_reset: bool,
    debug: bool,
    enable: Option<Toggle>,
    back: Option<Toggle>,
    side: Option<Toggle>,
    front: Option<Toggle>,
    mode: Option<Mode>,
}

impl Options {
    fn from_cli(matches: &ArgMatches) -> Self {
        Self {
            status: matches.get_flag("status"),
            force_reset: matches.get_flag("force-reset"),
            debug: matches.get_flag("debug"),
            enable: parse_arg(matches, "enable", TOGGLE_VALUES),
            back: parse_arg(matches, "back", TOGGLE_VALUES),
            side: parse_arg(matches, "side", TOGGLE_VALUES),
            front: parse_arg(matches, "front", TOGGLE_VALUES),
            mode: parse_arg(matches, "mode", MODE_VALUES),
        }
    }

    /// Apply the requested changes on top of the current state.
    fn apply<T: ControlTransport>(&self, device: &mut LedController<T>) {
        let groups = [(self.back, Leds::BACK), (self.side, Leds::SIDE), (self.front, Leds::FRONT)];
        for (toggle, leds) in groups {
            if let Some(toggle) = toggle {
                device.set_leds(leds, toggle.is_on());
            }
        }

        let mode = self.mode.unwrap_or(device.mode());
        let enabled = self.enable.map_or(device.enabled(), Toggle::is_on);
        device.set_mode(mode, enabled);
    }
}

fn main() {
    // Always exit successfully, even on usage errors.
    let matches = match cli().try_get_matches() {
        Ok(matches) => matches,
        Err(err) => {
            let _ = err.print();
            return;
        },
    };

    let options = Options::from_cli(&matches);
    init_logging(options.debug);

    // Nothing to do without any option.
    if std::env::args_os().len() < 2 {
        let _ = cli().print_help();
        return;
    }

    match run(&options) {
        Ok(()) => (),
        Err(Error::DeviceNotFound) => println!("LED controller not found!"),
        Err(err) => eprintln!("\x1b[31mError:\x1b[0m {err}"),
    }
}

/// Apply the requested configuration to the LED controller.
fn run(options: &Options) -> Result<()> {
    let open_options = OpenOptions { force_reset: options.force_reset, debug: options.debug };
    execute(
        options,
        || LedController::open(open_options),
        || SettingsStore::default_path().and_then(SettingsStore::open),
    )
}

/// Open the device, merge persisted settings, then report or apply the options.
///
/// Settings are saved only after the device accepted the new state.
fn execute<T, D, S>(options: &Options, open_device: D, open_store: S) -> Result<()>
where
    T: ControlTransport,
    D: FnOnce() -> Result<LedController<T>>,
    S: FnOnce() -> std::result::Result<SettingsStore, SettingsError>,
{
    let mut device = open_device()?;

    let mut store = match open_store() {
        Ok(store) => Some(store),
        Err(err) => {
            warn!("Settings unavailable, using defaults: {err}");
            None
        },
    };

    let settings = match &store {
        Some(store) => {
            debug!("Loading settings from {}", store.path().display());
            store.load()
        },
        None => Settings::default(),
    };
    device.apply_settings(&settings);

    if options.status {
        print_status(&device);
    } else {
        options.apply(&mut device);
        device.synchronize()?;
    }

    if let Some(store) = &mut store {
        if let Err(err) = store.save(&device.settings()) {
            warn!("Unable to save settings: {err}");
        }
    }

    Ok(())
}

/// Print the current device configuration.
fn print_status<T: ControlTransport>(device: &LedController<T>) {
    println!("{} v{}", crate_name!(), crate_version!());

    let name = device.device_name().unwrap_or_else(|err| {
        warn!("Unable to read device name: {err}");
        String::from("unknown")
    });
    let version = device.version().unwrap_or_else(|err| {
        warn!("Unable to read firmware version: {err}");
        String::from("unknown")
    });
    if version != EXPECTED_VERSION {
        warn!("Untested firmware version {version}, expected {EXPECTED_VERSION}");
    }

    println!("Device     : {name}");
    println!("Version    : {version}");
    println!("Back LEDs  : {}", on_off(device.is_enabled(Leds::BACK)));
    println!("Side LEDs  : {}", on_off(device.is_enabled(Leds::SIDE)));
    println!("Front LEDs : {}", on_off(device.is_enabled(Leds::FRONT)));
    println!("Mode       : {}", device.mode());
    println!("Enabled    : {}", on_off(device.enabled()));
}

#[inline]
fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

/// Setup log output to STDERR.
///
/// `RUST_LOG` takes precedence over the `--debug` flag.
fn init_logging(debug: bool) {
    let default = if debug { "gtlm=debug" } else { "gtlm=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Get clap CLI parameters.
fn cli() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .author("Artur Wyszynski <harakash@gmail.com>")
        .about(crate_description!())
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .help("Display program version")
                .long("version")
                .short('v')
                .action(ArgAction::Version),
        )
        .arg(
            Arg::new("status")
                .help("Display device status")
                .long("status")
                .short('d')
                .action(ArgAction::SetTrue),
        )
        .arg(Arg::new("enable").help("Set LEDs status [on/off]").long("enable").short('e'))
        .arg(Arg::new("back").help("Set rear LEDs [on/off]").long("back").short('b'))
        .arg(Arg::new("side").help("Set side LEDs [on/off]").long("side").short('s'))
        .arg(Arg::new("front").help("Set front LEDs [on/off]").long("front").short('f'))
        .arg(
            Arg::new("mode")
                .help("Set LEDs mode [blink/audio/breath/demo/always]")
                .long("mode")
                .short('m'),
        )
        .arg(
            Arg::new("force-reset")
                .help("Force device reset")
                .long("force-reset")
                .short('r')
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .help("Print diagnostic output")
                .long("debug")
                .action(ArgAction::SetTrue),
        )
}

/// Read an option value, reporting invalid values.
fn parse_arg<T>(matches: &ArgMatches, name: &str, expected: &'static str) -> Option<T>
where
    T: ValueEnum,
{
    let value = matches.get_one::<String>(name)?;
    match T::from_str(value, false) {
        Ok(value) => Some(value),
        Err(_) => {
            let err = invalid_argument(name, value, expected);
            eprintln!("\x1b[31m{err}\x1b[0m");
            None
        },
    }
}

fn invalid_argument(name: &str, value: &str, expected: &'static str) -> Error {
    Error::InvalidArgument { option: format!("--{name}"), value: value.to_string(), expected }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::time::Duration;

    use clap::error::ErrorKind;
    use gtlm::error::{TransferError, TransferKind};
    use gtlm::msi_gt660::FRAME_LEN;
    use gtlm::settings::FILE_NAME;
    use tempfile::TempDir;

    use super::*;

    /// LED controller echoing every request, in ALWAYS mode with LEDs enabled.
    #[derive(Default)]
    struct EchoDevice {
        frames: RefCell<Vec<Vec<u8>>>,
        /// Fail the nth write.
        fail_write: Option<usize>,
    }

    impl ControlTransport for &EchoDevice {
        fn write_control(
            &self,
            _request: u8,
            _value: u16,
            _index: u16,
            data: &[u8],
            _timeout: Duration,
        ) -> std::result::Result<usize, TransferError> {
            let mut frames = self.frames.borrow_mut();
            if self.fail_write == Some(frames.len()) {
                return Err(TransferError::new(TransferKind::Pipe));
            }
            frames.push(data.to_vec());
            Ok(data.len())
        }

        fn read_control(
            &self,
            _request: u8,
            _value: u16,
            _index: u16,
            buf: &mut [u8],
            _timeout: Duration,
        ) -> std::result::Result<usize, TransferError> {
            let frames = self.frames.borrow();
            let last = frames.last().map(Vec::as_slice).unwrap_or(&[]);
            buf[..last.len()].copy_from_slice(last);
            match last {
                [0x01, 0x10, ..] => buf[2..7].copy_from_slice(EXPECTED_VERSION.as_bytes()),
                [0x01, 0x01, 0x10, ..] => {
                    buf[3] = Mode::Always as u8;
                    buf[4] = 0x01;
                },
                _ => (),
            }
            Ok(FRAME_LEN)
        }

        fn device_name(&self) -> Result<String> {
            Ok("MSI EPF USB".into())
        }
    }

    fn execute_with(
        options: &Options,
        device: &EchoDevice,
        store: impl FnOnce() -> std::result::Result<SettingsStore, SettingsError>,
    ) -> Result<()> {
        execute(options, || LedController::new(device), store)
    }

    fn set_frames(device: &EchoDevice) -> Vec<Vec<u8>> {
        device.frames.borrow().iter().filter(|frame| frame[1] == 0x02).cloned().collect()
    }

    fn parse(args: &[&str]) -> Options {
        let matches = cli().try_get_matches_from(args.iter().copied()).unwrap();
        Options::from_cli(&matches)
    }

    #[test]
    fn parses_all_options() {
        let options = parse(&[
            "gtlm",
            "--enable=off",
            "--back=on",
            "--side=off",
            "--front=on",
            "--mode=breath",
            "--force-reset",
        ]);

        assert_eq!(options.enable, Some(Toggle::Off));
        assert_eq!(options.back, Some(Toggle::On));
        assert_eq!(options.side, Some(Toggle::Off));
        assert_eq!(options.front, Some(Toggle::On));
        assert_eq!(options.mode, Some(Mode::Breath));
        assert!(options.force_reset);
        assert!(!options.status);
    }

    #[test]
    fn invalid_values_are_skipped() {
        let options = parse(&["gtlm", "--back=maybe", "--mode=disco", "--side=off"]);

        assert_eq!(options.back, None);
        assert_eq!(options.mode, None);
        assert_eq!(options.side, Some(Toggle::Off));
    }

    #[test]
    fn tokens_are_case_sensitive() {
        let options = parse(&["gtlm", "--front=ON", "--mode=Blink"]);

        assert_eq!(options.front, None);
        assert_eq!(options.mode, None);
    }

    #[test]
    fn invalid_argument_message() {
        let err = invalid_argument("mode", "disco", "'blink'");
        assert_eq!(err.to_string(), "--mode: wrong argument 'disco', use 'blink'");
    }

    #[test]
    fn missing_device_stops_before_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);
        let store_opened = Cell::new(false);

        let result = execute(
            &parse(&["gtlm", "--mode=breath"]),
            || -> Result<LedController<&EchoDevice>> { Err(Error::DeviceNotFound) },
            || {
                store_opened.set(true);
                SettingsStore::open(&path)
            },
        );

        assert!(matches!(result, Err(Error::DeviceNotFound)));
        assert!(!store_opened.get());
        assert!(!path.exists());
    }

    #[test]
    fn unavailable_settings_keep_leds_on() {
        let device = EchoDevice::default();
        let options = parse(&["gtlm", "--mode=breath"]);

        execute_with(&options, &device, || Err(SettingsError::NoHomeDirectory)).unwrap();

        assert_eq!(set_frames(&device), vec![
            vec![0x01, 0x02, 0x30, 0x07, 0, 0, 0, 0],
            vec![0x01, 0x02, 0x20, 0x03, 0x01, 0, 0, 0],
        ]);
    }

    #[test]
    fn malformed_settings_keep_leds_on() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "settings = {\n").unwrap();
        let device = EchoDevice::default();

        execute_with(&parse(&["gtlm", "--side=off"]), &device, || SettingsStore::open(&path))
            .unwrap();

        assert_eq!(set_frames(&device)[0], vec![0x01, 0x02, 0x30, 0x05, 0, 0, 0, 0]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "settings = {\n");
    }

    #[test]
    fn applied_options_are_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "[settings]\nfront = false\nmode = 1\n").unwrap();
        let device = EchoDevice::default();

        let options = parse(&["gtlm", "--back=off", "--enable=off"]);
        execute_with(&options, &device, || SettingsStore::open(&path)).unwrap();

        assert_eq!(set_frames(&device), vec![
            vec![0x01, 0x02, 0x30, 0x02, 0, 0, 0, 0],
            vec![0x01, 0x02, 0x20, 0x01, 0x00, 0, 0, 0],
        ]);
        let saved = SettingsStore::open(&path).unwrap().load();
        assert_eq!(saved, Settings {
            back: false,
            side: true,
            front: false,
            mode: Mode::Blink,
            enabled: false
        });
    }

    #[test]
    fn failed_synchronize_keeps_settings_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);
        let content = "[settings]\nmode = 4\nback = false\n";
        fs::write(&path, content).unwrap();

        // The first write is the mode query on open.
        let device = EchoDevice { fail_write: Some(1), ..Default::default() };
        let result =
            execute_with(&parse(&["gtlm", "--mode=blink"]), &device, || SettingsStore::open(&path));

        assert!(matches!(
            result,
            Err(Error::Transfer(TransferError { kind: TransferKind::Pipe, code: -9 }))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn status_does_not_synchronize() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);
        let device = EchoDevice::default();

        execute_with(&parse(&["gtlm", "--status"]), &device, || SettingsStore::open(&path))
            .unwrap();

        assert!(set_frames(&device).is_empty());
        assert_eq!(SettingsStore::open(&path).unwrap().load(), Settings::default());
    }

    #[test]
    fn short_version_flag() {
        let err = cli().try_get_matches_from(["gtlm", "-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);

        let err = cli().try_get_matches_from(["gtlm", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn cli_is_valid() {
        cli().debug_assert();
    }
}
