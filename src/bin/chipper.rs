/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The `chipper` binary program.
//!
//! Everything here is platform glue around the interpreter: an SDL window
//! that the framebuffer is blitted into, a keymap from the host keyboard to
//! the CHIP-8 keypad, a square-wave buzzer gated by the sound trigger and a
//! main loop that runs the interpreter at a fixed cadence.

extern crate chipper;
extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
extern crate sdl2;

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::process;
use std::thread;
use std::time::Duration;

use clap::{App, Arg, ArgMatches};
use failure::{Error, ResultExt};
use log::LevelFilter;
use sdl2::audio::{AudioCallback, AudioSpecDesired};
use sdl2::event::Event;
use sdl2::keyboard::{Keycode, Mod};
use sdl2::pixels::Color;
use sdl2::rect::Rect;
use sdl2::render::Canvas;
use sdl2::video::Window;

use chipper::display;
use chipper::input::Key;
use chipper::interpreter::{Interpreter, Options, SoundTrigger};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// An SDL error.
#[derive(Debug, Fail)]
#[fail(display = "SDL error: {}", _0)]
struct SdlError(String);

/// The window the interpreter's framebuffer is drawn into.
struct Display {
    /// The underlying SDL canvas.
    canvas: Canvas<Window>,
    /// The background color to use.
    bg: Color,
    /// The foreground color to use.
    fg: Color,
}

impl Display {
    /// Initializes the display and returns the resulting object.
    fn new(
        video_subsystem: sdl2::VideoSubsystem,
        width: u32,
        height: u32,
        bg: Color,
        fg: Color,
    ) -> Result<Self, Error> {
        let window = video_subsystem.window("chipper", width, height).build()?;
        let mut canvas = window.into_canvas().build()?;

        canvas.set_draw_color(bg);
        canvas.clear();
        canvas.present();

        Ok(Display { canvas, bg, fg })
    }

    /// Draws the given framebuffer to the window.
    fn draw(&mut self, buffer: &display::Buffer) -> Result<(), SdlError> {
        let (width, height) = self.canvas.window().size();
        let scalex = width / display::WIDTH as u32;
        let scaley = height / display::HEIGHT as u32;

        self.canvas.set_draw_color(self.bg);
        self.canvas.clear();
        self.canvas.set_draw_color(self.fg);
        for y in 0..display::HEIGHT {
            for x in 0..display::WIDTH {
                if buffer.pixel(x, y) != 0 {
                    let px = x as i32 * scalex as i32;
                    let py = y as i32 * scaley as i32;

                    self.canvas
                        .fill_rect(Rect::new(px, py, scalex, scaley))
                        .map_err(SdlError)?;
                }
            }
        }
        self.canvas.present();
        Ok(())
    }
}

/// A utility to process SDL key events and press/release the corresponding
/// keys in the interpreter's keypad state.
struct Controller {
    /// The map from keycodes to CHIP-8 keys.
    ///
    /// This is the conventional 1234/QWER/ASDF/ZXCV layout for the 4x4
    /// keypad; scancodes would survive alternative keyboard layouts better,
    /// but keycodes are much easier to document.
    keymap: HashMap<Keycode, Key>,
}

impl Controller {
    /// Returns a controller with the default keymap.
    fn new() -> Self {
        use Keycode::*;
        use Key::*;

        let pairs = [
            (Num1, K1),
            (Num2, K2),
            (Num3, K3),
            (Num4, KC),
            (Q, K4),
            (W, K5),
            (E, K6),
            (R, KD),
            (A, K7),
            (S, K8),
            (D, K9),
            (F, KE),
            (Z, KA),
            (X, K0),
            (C, KB),
            (V, KF),
        ];
        Controller {
            keymap: pairs.iter().cloned().collect(),
        }
    }

    /// Processes the given SDL event, applying the corresponding action to
    /// the given interpreter.
    fn process(&self, event: Event, interpreter: &mut Interpreter) {
        match event {
            Event::KeyDown {
                keycode: Some(key), ..
            } => if let Some(&key) = self.keymap.get(&key) {
                interpreter.input_mut().press(key);
            },
            Event::KeyUp {
                keycode: Some(key), ..
            } => if let Some(&key) = self.keymap.get(&key) {
                interpreter.input_mut().release(key);
            },
            _ => {}
        }
    }
}

/// A simple square wave generator for the buzzer.
struct SquareWave {
    volume: f32,
    phase: f32,
    phase_inc: f32,
}

impl SquareWave {
    /// Returns a square wave generator with the given volume and frequency
    /// (in Hz).  The device's sample rate must be provided to calculate the
    /// actual frequency of samples.
    fn new(volume: f32, frequency: f32, sample_rate: i32) -> Self {
        SquareWave {
            volume,
            phase: 0.0,
            phase_inc: frequency / sample_rate as f32,
        }
    }
}

impl AudioCallback for SquareWave {
    type Channel = f32;

    fn callback(&mut self, out: &mut [f32]) {
        for x in out.iter_mut() {
            *x = if self.phase <= 0.5 {
                self.volume
            } else {
                -self.volume
            };
            self.phase = (self.phase + self.phase_inc) % 1.0;
        }
    }
}

fn main() {
    let matches = App::new("chipper")
        .version(VERSION)
        .about("A CHIP-8 interpreter")
        .help_message("show this help message and exit")
        .version_message("show version information and exit")
        .arg(
            Arg::with_name("cycles")
                .short("c")
                .long("cycles")
                .value_name("N")
                .help("set the number of instructions per timer tick")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("scale")
                .short("s")
                .long("scale")
                .value_name("SCALE")
                .help("set game display scale")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .value_name("SEED")
                .help("seed the random number generator for reproducible runs")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("tone")
                .short("t")
                .long("tone")
                .value_name("FREQ")
                .help("set game buzzer tone (in Hz)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("increase verbosity"),
        )
        .arg(
            Arg::with_name("volume")
                .long("volume")
                .value_name("VOL")
                .help("set game buzzer volume (0-100)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("FILE")
                .help("set the ROM file to run")
                .required(true)
                .index(1),
        )
        .get_matches();

    let verbosity = matches.occurrences_of("verbose");
    let filter = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter(None, filter)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        for cause in e.iter_chain().skip(1) {
            info!("caused by: {}", cause);
        }
        trace!("backtrace: {}", e.backtrace());
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let cycles_per_tick = matches
        .value_of("cycles")
        .map(|n| n.parse::<u32>())
        .unwrap_or(Ok(9))
        .context("invalid cycles argument")?;
    let scale = matches
        .value_of("scale")
        .map(|n| n.parse::<u32>())
        .unwrap_or(Ok(10))
        .context("invalid scale argument")?;
    let tone = matches
        .value_of("tone")
        .map(|n| n.parse::<u32>())
        .unwrap_or(Ok(440))
        .context("invalid tone argument")?;
    let volume = matches
        .value_of("volume")
        .map(|n| n.parse::<u32>())
        .unwrap_or(Ok(10))
        .context("invalid volume argument")?;
    if cycles_per_tick == 0 {
        return Err(format_err!("cycles argument must be at least 1"));
    }

    let mut opts = Options::new();
    opts.rng_seed = match matches.value_of("seed") {
        Some(seed) => Some(seed.parse::<u64>().context("invalid seed argument")?),
        None => None,
    };

    let filename = matches.value_of("FILE").unwrap();
    let mut input =
        File::open(filename).with_context(|_| format!("could not open file '{}'", filename))?;
    let mut interpreter = Interpreter::with_options(opts);
    interpreter
        .load_program(&mut input)
        .with_context(|_| format!("could not load ROM from file '{}'", filename))?;

    let sdl_context = sdl2::init()
        .map_err(SdlError)
        .context("could not initialize SDL")?;
    let video_subsystem = sdl_context
        .video()
        .map_err(SdlError)
        .context("could not initialize SDL video subsystem")?;
    let audio_subsystem = sdl_context
        .audio()
        .map_err(SdlError)
        .context("could not initialize SDL audio subsystem")?;
    let mut event_pump = sdl_context
        .event_pump()
        .map_err(SdlError)
        .context("could not initialize SDL event loop")?;
    let mut display = Display::new(
        video_subsystem,
        display::WIDTH as u32 * scale,
        display::HEIGHT as u32 * scale,
        Color::RGB(0, 0, 0),
        Color::RGB(255, 255, 255),
    )?;
    let controller = Controller::new();
    let device = audio_subsystem
        .open_playback(
            None,
            &AudioSpecDesired {
                freq: Some(44100),
                channels: Some(1),
                samples: None,
            },
            |spec| SquareWave::new(volume as f32 / 100.0, tone as f32, spec.freq),
        )
        .map_err(SdlError)
        .context("could not initialize SDL audio playback")?;

    // Timers tick at 60 Hz, so the instruction rate implied by the chosen
    // cycles-per-tick sets the loop pacing.
    let pace = Duration::from_micros(1_000_000 / (60 * cycles_per_tick as u64));
    let mut cycles = 0;
    let mut paused = false;

    'main: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'main,
                Event::Window { .. } => interpreter.display_mut().force_refresh(),
                Event::KeyDown {
                    keycode: Some(Keycode::P),
                    keymod,
                    repeat: false,
                    ..
                } if ctrl_held(keymod) =>
                {
                    paused = !paused;
                    info!("{}", if paused { "paused" } else { "resumed" });
                }
                Event::KeyDown {
                    keycode: Some(Keycode::R),
                    keymod,
                    repeat: false,
                    ..
                } if ctrl_held(keymod) =>
                {
                    info!("resetting interpreter");
                    interpreter.reset();
                }
                e => controller.process(e, &mut interpreter),
            }
        }

        if !paused {
            // The necessary context for any error in 'step' is provided by
            // the method itself; more context here would shadow the more
            // useful errors defined there.
            interpreter.step()?;
            cycles += 1;
            if cycles == cycles_per_tick {
                cycles = 0;
                match interpreter.tick_timers() {
                    SoundTrigger::Play => device.resume(),
                    _ => device.pause(),
                }
            }
        }

        interpreter
            .display_mut()
            .refresh(|buf| display.draw(buf))
            .context("could not refresh display window")?;
        thread::sleep(pace);
    }

    Ok(())
}

/// Returns whether either control key is part of the given modifier state.
fn ctrl_held(keymod: Mod) -> bool {
    keymod.intersects(Mod::LCTRLMOD | Mod::RCTRLMOD)
}
