mod config;

use crate::config::Config;
use dotenv::dotenv;
use grovelcd_i2c::lcd::{CursorDirection, GroveLcd, WriteStrategy};
use log::{debug, info};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("Grove LCD demo starting...");

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };

    let strategy = if config.bulk_writes {
        WriteStrategy::Bulk
    } else {
        WriteStrategy::PerByte
    };

    debug!("Opening {} with {:?} writes...", config.bus, strategy);
    let mut lcd = GroveLcd::open(&config.bus, strategy)?;
    debug!("{:?} initialized.", lcd);

    // Two-line mode, then display on with a visible cursor.
    lcd.function_set(false, true, false)?;
    lcd.set_display_control(true, true, false)?;

    lcd.clear_display()?;
    thread::sleep(Duration::from_millis(500));

    lcd.set_cursor(0, 0)?;
    lcd.print(&config.message)?;
    thread::sleep(Duration::from_millis(500));

    // Cycle the backlight through the primaries, then settle on white.
    for (red, green, blue) in [(255, 0, 0), (0, 255, 0), (0, 0, 255)] {
        lcd.set_color(red, green, blue)?;
        thread::sleep(Duration::from_secs(1));
    }
    lcd.set_color(255, 255, 255)?;

    // Toggle the display off and back on.
    lcd.set_display_control(false, false, false)?;
    thread::sleep(Duration::from_millis(500));
    lcd.set_display_control(true, false, false)?;
    thread::sleep(Duration::from_millis(500));

    // Cursor and blink demo on the second line.
    lcd.set_cursor(1, 0)?;
    lcd.set_display_control(true, true, false)?;
    thread::sleep(Duration::from_millis(500));
    lcd.set_display_control(true, true, true)?;
    thread::sleep(Duration::from_millis(500));
    lcd.set_display_control(true, true, false)?;
    thread::sleep(Duration::from_millis(500));
    lcd.set_display_control(true, false, false)?;
    thread::sleep(Duration::from_millis(500));

    // Scroll the whole display left, then back right.
    for _ in 0..5 {
        lcd.shift(true, CursorDirection::Left)?;
        thread::sleep(Duration::from_millis(250));
    }
    for _ in 0..5 {
        lcd.shift(true, CursorDirection::Right)?;
        thread::sleep(Duration::from_millis(250));
    }

    info!("Entering clock loop...");
    loop {
        lcd.set_cursor(1, 0)?;

        let now = OffsetDateTime::now_local()?;
        let text = format!(
            "Time: {:02}:{:02}:{:02}",
            now.hour(),
            now.minute(),
            now.second()
        );
        lcd.write(text.as_bytes())?;

        thread::sleep(Duration::from_millis(500));
    }
}
