use crate::lcd::cmd;
use crate::linux::LinuxI2cBus;
use crate::{I2cBus, I2cError, I2cResult};
use log::{debug, error, warn};
use std::thread::sleep;
use std::time::Duration;

/// 7-bit bus address of the LCD controller.
pub const LCD_ADDRESS: u16 = 0x3e;
/// 7-bit bus address of the RGB backlight controller.
pub const RGB_ADDRESS: u16 = 0x62;

/// Control byte opening a command frame.
const CONTROL_COMMAND: u8 = 0x00;
/// Control byte opening a display-RAM data frame.
const CONTROL_DATA: u8 = 0x40;

/// Longest payload accepted by a single display-RAM write.
pub const MAX_PAYLOAD: usize = 127;

// Clear and home take the controller ~1.53 ms to execute, everything
// else ~39 us. Rounded up per the Grove LCD documentation. Data writes
// need ~43 us.
const SETTLE_CLEAR: Duration = Duration::from_micros(1600);
const SETTLE_COMMAND: Duration = Duration::from_micros(40);
const SETTLE_DATA: Duration = Duration::from_micros(45);

// RGB controller register map (PCA9633-compatible).
const REG_MODE1: u8 = 0x00;
const REG_MODE2: u8 = 0x01;
const REG_LED_OUT: u8 = 0x08;
const REG_RED: u8 = 0x04;
const REG_GREEN: u8 = 0x03;
const REG_BLUE: u8 = 0x02;

/// How display-RAM payloads are split into bus messages.
///
/// Some I2C adapters cannot reliably carry large multi-byte messages,
/// so the default sends one two-byte frame per character. Adapters that
/// do support large atomic writes can use [`WriteStrategy::Bulk`],
/// which sends the control byte and the whole payload as one message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum WriteStrategy {
    #[default]
    PerByte,
    Bulk,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    Left,
    Right,
}

/// An open session against the two controllers of a Grove LCD module.
///
/// The session owns both bus handles for its whole lifetime. Any
/// transport fault closes both handles before the error is returned, so
/// a failed session never leaks an open descriptor; the caller decides
/// whether to terminate. After a fault every further operation fails
/// with [`I2cError::Closed`].
#[derive(Debug)]
pub struct GroveLcd {
    lcd: Box<dyn I2cBus>,
    rgb: Box<dyn I2cBus>,
    strategy: WriteStrategy,
}

impl GroveLcd {
    /// Opens `path` twice and binds one handle to the LCD controller
    /// and one to the RGB controller.
    ///
    /// If the second open or bind fails, the first handle is closed
    /// before the error propagates.
    pub fn open(path: &str, strategy: WriteStrategy) -> I2cResult<Self> {
        let mut lcd = LinuxI2cBus::open(path, LCD_ADDRESS)?;
        let rgb = match LinuxI2cBus::open(path, RGB_ADDRESS) {
            Ok(bus) => bus,
            Err(err) => {
                lcd.close();
                error!("Error opening RGB controller: {}", err);
                return Err(err);
            }
        };

        debug!(
            "Opened {} for LCD ({:#04x}) and RGB ({:#04x}), {:?} writes",
            path, LCD_ADDRESS, RGB_ADDRESS, strategy
        );

        Ok(GroveLcd {
            lcd: Box::new(lcd),
            rgb: Box::new(rgb),
            strategy,
        })
    }

    /// Builds a session from already-open handles.
    ///
    /// `lcd` must be bound to [`LCD_ADDRESS`] and `rgb` to
    /// [`RGB_ADDRESS`]. Intended for non-Linux transports and tests.
    pub fn with_buses(
        lcd: Box<dyn I2cBus>,
        rgb: Box<dyn I2cBus>,
        strategy: WriteStrategy,
    ) -> Self {
        GroveLcd { lcd, rgb, strategy }
    }

    /// Releases both handles. Best-effort; safe to call twice.
    pub fn close(&mut self) {
        self.lcd.close();
        self.rgb.close();
    }

    /// Closes both handles and logs the fault before it propagates.
    fn fail(&mut self, err: I2cError) -> I2cError {
        self.lcd.close();
        self.rgb.close();
        error!("I2C transport fault: {}", err);
        err
    }

    /// Writes one frame and checks that the transport accepted it all.
    fn send(bus: &mut dyn I2cBus, frame: &[u8]) -> I2cResult<()> {
        let written = bus.write(frame)?;
        if written != frame.len() {
            return Err(I2cError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }
        Ok(())
    }

    /// Sends one opcode (optionally OR-combined with flags from its
    /// group in [`cmd`]) to the LCD controller.
    ///
    /// Blocks until the controller has had time to execute it: 1.6 ms
    /// for clear and home, 40 us for everything else. Issuing the next
    /// command earlier corrupts the display state, so the delay is not
    /// optional.
    pub fn command(&mut self, value: u8) -> I2cResult<()> {
        let frame = [CONTROL_COMMAND, value];
        if let Err(err) = Self::send(self.lcd.as_mut(), &frame) {
            return Err(self.fail(err));
        }

        match value {
            cmd::CLEAR | cmd::CURSOR_HOME => sleep(SETTLE_CLEAR),
            _ => sleep(SETTLE_COMMAND),
        }

        Ok(())
    }

    /// Writes character bytes at the controller's current cursor
    /// position.
    ///
    /// Payloads longer than [`MAX_PAYLOAD`] bytes are dropped without
    /// touching the bus; a warning is logged. The chunking strategy
    /// chosen at construction decides whether the payload goes out one
    /// byte per message or as a single bulk message.
    pub fn write(&mut self, payload: &[u8]) -> I2cResult<()> {
        if payload.len() > MAX_PAYLOAD {
            warn!(
                "Dropping {}-byte payload; display-RAM writes carry at most {} bytes",
                payload.len(),
                MAX_PAYLOAD
            );
            return Ok(());
        }

        match self.strategy {
            WriteStrategy::PerByte => {
                for &byte in payload {
                    let frame = [CONTROL_DATA, byte];
                    if let Err(err) = Self::send(self.lcd.as_mut(), &frame) {
                        return Err(self.fail(err));
                    }
                    sleep(SETTLE_DATA);
                }
            }
            WriteStrategy::Bulk => {
                let mut frame = Vec::with_capacity(payload.len() + 1);
                frame.push(CONTROL_DATA);
                frame.extend_from_slice(payload);
                if let Err(err) = Self::send(self.lcd.as_mut(), &frame) {
                    return Err(self.fail(err));
                }
                sleep(SETTLE_DATA);
            }
        }

        Ok(())
    }

    /// Programs the backlight PWM outputs to the given color.
    ///
    /// The controller's full init sequence is re-issued on every call,
    /// so the protocol carries no state between calls. The RGB
    /// controller has no execution latency comparable to the LCD's, so
    /// no settle delay is needed.
    pub fn set_color(&mut self, red: u8, green: u8, blue: u8) -> I2cResult<()> {
        let frames = [
            [REG_MODE1, 0x00],
            [REG_MODE2, 0x01],
            [REG_LED_OUT, 0xaa],
            [REG_RED, red],
            [REG_GREEN, green],
            [REG_BLUE, blue],
        ];

        for frame in frames {
            if let Err(err) = Self::send(self.rgb.as_mut(), &frame) {
                return Err(self.fail(err));
            }
        }

        Ok(())
    }

    /// Clears the display and sets the cursor to the home position.
    pub fn clear_display(&mut self) -> I2cResult<()> {
        self.command(cmd::CLEAR)
    }

    /// Sets the cursor to the home position.
    pub fn return_home(&mut self) -> I2cResult<()> {
        self.command(cmd::CURSOR_HOME)
    }

    /// Sets the display to the specified entry mode.
    pub fn set_entry_mode(
        &mut self,
        cursor_direction: CursorDirection,
        shift: bool,
    ) -> I2cResult<()> {
        let mut command = cmd::ENTRY_MODE_SET;
        if cursor_direction == CursorDirection::Right {
            // The datasheet calls the increment flag "entry left".
            command |= cmd::ENTRY_LEFT;
        }
        if shift {
            command |= cmd::ENTRY_SHIFT_INCREMENT;
        }
        self.command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    pub fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> I2cResult<()> {
        let mut command = cmd::DISPLAY_CONTROL;
        if display_on {
            command |= cmd::DISPLAY_ON;
        }
        if cursor_on {
            command |= cmd::CURSOR_ON;
        }
        if blink_on {
            command |= cmd::BLINK_ON;
        }
        self.command(command)
    }

    /// Moves the cursor or shifts the whole display.
    pub fn shift(&mut self, display_shift: bool, direction: CursorDirection) -> I2cResult<()> {
        let mut command = cmd::SHIFT;
        if display_shift {
            command |= cmd::DISPLAY_MOVE;
        }
        if direction == CursorDirection::Right {
            command |= cmd::MOVE_RIGHT;
        }
        self.command(command)
    }

    /// Sets the function set.
    pub fn function_set(
        &mut self,
        eight_bit: bool,
        two_lines: bool,
        alt_font: bool,
    ) -> I2cResult<()> {
        let mut command = cmd::FUNCTION_SET;
        if eight_bit {
            command |= cmd::MODE_8BIT;
        }
        if two_lines {
            command |= cmd::LINES_2;
        }
        if alt_font {
            command |= cmd::FONT_5X10;
        }
        self.command(command)
    }

    /// Sets the CGRAM address.
    pub fn set_cgram_address(&mut self, address: u8) -> I2cResult<()> {
        if address > 0x3f {
            return Err(I2cError::InvalidArgument);
        }
        self.command(cmd::SET_CGRAM_ADDR | address)
    }

    /// Sets the DDRAM address.
    pub fn set_ddram_address(&mut self, address: u8) -> I2cResult<()> {
        if address > 0x7f {
            return Err(I2cError::InvalidArgument);
        }
        self.command(cmd::SET_DDRAM_ADDR | address)
    }

    /// Moves the cursor to the given position in 2-line mode.
    ///
    /// The second line starts at DDRAM address 0x40; each line holds 40
    /// characters, of which 16 are visible without shifting.
    pub fn set_cursor(&mut self, row: usize, col: usize) -> I2cResult<()> {
        if row >= 2 || col >= 40 {
            return Err(I2cError::InvalidArgument);
        }
        self.set_ddram_address((col + 0x40 * row) as u8)
    }

    /// Writes a string at the current cursor position.
    ///
    /// Non-ASCII characters are replaced with `?`, since the controller
    /// only renders its own 8-bit character set.
    pub fn print(&mut self, s: &str) -> I2cResult<()> {
        let bytes: Vec<u8> = s
            .chars()
            .map(|c| {
                if c.is_ascii() {
                    c as u8
                } else {
                    warn!("Non-ASCII character: {}", c);
                    b'?'
                }
            })
            .collect();
        self.write(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;

    #[derive(Debug, Default)]
    struct MockState {
        frames: Vec<Vec<u8>>,
        closed: bool,
        fail_at: Option<usize>,
        short_at: Option<usize>,
        writes: usize,
    }

    #[derive(Debug)]
    struct MockBus(Rc<RefCell<MockState>>);

    impl MockBus {
        fn new() -> (Self, Rc<RefCell<MockState>>) {
            let state = Rc::new(RefCell::new(MockState::default()));
            (MockBus(state.clone()), state)
        }
    }

    impl I2cBus for MockBus {
        fn write(&mut self, buf: &[u8]) -> I2cResult<usize> {
            let mut state = self.0.borrow_mut();
            if state.closed {
                return Err(I2cError::Closed);
            }
            let index = state.writes;
            state.writes += 1;
            if state.fail_at == Some(index) {
                return Err(I2cError::Write { errno: libc::EIO });
            }
            if state.short_at == Some(index) {
                return Ok(buf.len() - 1);
            }
            state.frames.push(buf.to_vec());
            Ok(buf.len())
        }

        fn close(&mut self) {
            self.0.borrow_mut().closed = true;
        }

        fn is_open(&self) -> bool {
            !self.0.borrow().closed
        }
    }

    type States = (Rc<RefCell<MockState>>, Rc<RefCell<MockState>>);

    fn session(strategy: WriteStrategy) -> (GroveLcd, States) {
        let (lcd, lcd_state) = MockBus::new();
        let (rgb, rgb_state) = MockBus::new();
        let session = GroveLcd::with_buses(Box::new(lcd), Box::new(rgb), strategy);
        (session, (lcd_state, rgb_state))
    }

    #[test]
    fn command_sends_control_framed_byte() {
        let (mut lcd, (lcd_state, _)) = session(WriteStrategy::PerByte);
        lcd.command(cmd::DISPLAY_CONTROL | cmd::DISPLAY_ON | cmd::CURSOR_ON)
            .unwrap();
        assert_eq!(lcd_state.borrow().frames, vec![vec![0x00, 0x0e]]);
    }

    #[test]
    fn clear_waits_for_execution() {
        let (mut lcd, _) = session(WriteStrategy::PerByte);
        let start = Instant::now();
        lcd.clear_display().unwrap();
        assert!(start.elapsed() >= Duration::from_micros(1600));
    }

    #[test]
    fn home_waits_for_execution() {
        let (mut lcd, _) = session(WriteStrategy::PerByte);
        let start = Instant::now();
        lcd.return_home().unwrap();
        assert!(start.elapsed() >= Duration::from_micros(1600));
    }

    #[test]
    fn write_per_byte_sends_one_frame_per_character() {
        let (mut lcd, (lcd_state, _)) = session(WriteStrategy::PerByte);
        lcd.write(b"HI").unwrap();
        assert_eq!(
            lcd_state.borrow().frames,
            vec![vec![0x40, b'H'], vec![0x40, b'I']]
        );
    }

    #[test]
    fn write_bulk_sends_single_frame() {
        let (mut lcd, (lcd_state, _)) = session(WriteStrategy::Bulk);
        lcd.write(b"HI").unwrap();
        assert_eq!(lcd_state.borrow().frames, vec![vec![0x40, b'H', b'I']]);
    }

    #[test]
    fn payload_at_limit_is_sent() {
        let (mut lcd, (lcd_state, _)) = session(WriteStrategy::Bulk);
        let payload = [b'x'; MAX_PAYLOAD];
        lcd.write(&payload).unwrap();
        let frames = &lcd_state.borrow().frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), MAX_PAYLOAD + 1);
        assert_eq!(frames[0][0], 0x40);
    }

    #[test]
    fn oversized_payload_is_dropped_without_error() {
        for strategy in [WriteStrategy::PerByte, WriteStrategy::Bulk] {
            let (mut lcd, (lcd_state, _)) = session(strategy);
            let payload = [b'x'; MAX_PAYLOAD + 1];
            lcd.write(&payload).unwrap();
            assert!(lcd_state.borrow().frames.is_empty());
            assert!(!lcd_state.borrow().closed);
        }
    }

    #[test]
    fn set_color_issues_fixed_register_sequence() {
        let (mut lcd, (_, rgb_state)) = session(WriteStrategy::PerByte);
        lcd.set_color(255, 64, 0).unwrap();
        assert_eq!(
            rgb_state.borrow().frames,
            vec![
                vec![0x00, 0x00],
                vec![0x01, 0x01],
                vec![0x08, 0xaa],
                vec![0x04, 255],
                vec![0x03, 64],
                vec![0x02, 0],
            ]
        );
    }

    #[test]
    fn set_color_carries_no_state_between_calls() {
        let (mut lcd, (_, rgb_state)) = session(WriteStrategy::PerByte);
        lcd.set_color(10, 20, 30).unwrap();
        lcd.set_color(10, 20, 30).unwrap();
        let frames = &rgb_state.borrow().frames;
        assert_eq!(frames.len(), 12);
        assert_eq!(frames[..6], frames[6..]);
    }

    #[test]
    fn repeated_command_produces_identical_frames() {
        let (mut lcd, (lcd_state, _)) = session(WriteStrategy::PerByte);
        lcd.command(cmd::ENTRY_MODE_SET | cmd::ENTRY_LEFT).unwrap();
        lcd.command(cmd::ENTRY_MODE_SET | cmd::ENTRY_LEFT).unwrap();
        let frames = &lcd_state.borrow().frames;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], frames[1]);
    }

    #[test]
    fn short_write_closes_both_handles() {
        let (mut lcd, (lcd_state, rgb_state)) = session(WriteStrategy::PerByte);
        lcd_state.borrow_mut().short_at = Some(0);
        let err = lcd.command(cmd::CLEAR).unwrap_err();
        assert_eq!(
            err,
            I2cError::ShortWrite {
                written: 1,
                expected: 2
            }
        );
        assert!(lcd_state.borrow().closed);
        assert!(rgb_state.borrow().closed);
    }

    #[test]
    fn write_error_stops_sequence_and_closes_handles() {
        let (mut lcd, (lcd_state, rgb_state)) = session(WriteStrategy::PerByte);
        rgb_state.borrow_mut().fail_at = Some(2);
        let err = lcd.set_color(1, 2, 3).unwrap_err();
        assert_eq!(err, I2cError::Write { errno: libc::EIO });
        // Only the two frames before the fault went out.
        assert_eq!(
            rgb_state.borrow().frames,
            vec![vec![0x00, 0x00], vec![0x01, 0x01]]
        );
        assert!(lcd_state.borrow().closed);
        assert!(rgb_state.borrow().closed);
    }

    #[test]
    fn per_byte_write_stops_at_first_fault() {
        let (mut lcd, (lcd_state, _)) = session(WriteStrategy::PerByte);
        lcd_state.borrow_mut().short_at = Some(1);
        let err = lcd.write(b"ABC").unwrap_err();
        assert_eq!(
            err,
            I2cError::ShortWrite {
                written: 1,
                expected: 2
            }
        );
        assert_eq!(lcd_state.borrow().frames, vec![vec![0x40, b'A']]);
    }

    #[test]
    fn address_range_is_validated_without_touching_the_bus() {
        let (mut lcd, (lcd_state, _)) = session(WriteStrategy::PerByte);
        assert_eq!(
            lcd.set_cgram_address(0x40).unwrap_err(),
            I2cError::InvalidArgument
        );
        assert_eq!(
            lcd.set_ddram_address(0x80).unwrap_err(),
            I2cError::InvalidArgument
        );
        assert_eq!(
            lcd.set_cursor(2, 0).unwrap_err(),
            I2cError::InvalidArgument
        );
        assert!(lcd_state.borrow().frames.is_empty());
        // Argument errors are not transport faults; handles stay open.
        assert!(!lcd_state.borrow().closed);
    }

    #[test]
    fn set_cursor_maps_second_row() {
        let (mut lcd, (lcd_state, _)) = session(WriteStrategy::PerByte);
        lcd.set_cursor(1, 3).unwrap();
        assert_eq!(lcd_state.borrow().frames, vec![vec![0x00, 0x80 | 0x43]]);
    }

    #[test]
    fn print_replaces_non_ascii_characters() {
        let (mut lcd, (lcd_state, _)) = session(WriteStrategy::PerByte);
        lcd.print("a°b").unwrap();
        assert_eq!(
            lcd_state.borrow().frames,
            vec![vec![0x40, b'a'], vec![0x40, b'?'], vec![0x40, b'b']]
        );
    }

    #[test]
    fn closed_session_rejects_further_operations() {
        let (mut lcd, _) = session(WriteStrategy::PerByte);
        lcd.close();
        assert_eq!(lcd.command(cmd::CLEAR).unwrap_err(), I2cError::Closed);
    }

    #[test]
    fn end_to_end_scenario() {
        let (mut lcd, (lcd_state, rgb_state)) = session(WriteStrategy::PerByte);

        lcd.command(cmd::DISPLAY_CONTROL | cmd::DISPLAY_ON | cmd::CURSOR_ON | cmd::BLINK_OFF)
            .unwrap();
        lcd.write(b"HI").unwrap();
        lcd.set_color(255, 0, 0).unwrap();
        lcd.close();

        assert_eq!(
            lcd_state.borrow().frames,
            vec![vec![0x00, 0x0e], vec![0x40, b'H'], vec![0x40, b'I']]
        );
        let rgb_frames = &rgb_state.borrow().frames;
        assert_eq!(rgb_frames.len(), 6);
        assert_eq!(
            rgb_frames[3..],
            [vec![0x04, 255], vec![0x03, 0], vec![0x02, 0]]
        );
        assert!(lcd_state.borrow().closed);
        assert!(rgb_state.borrow().closed);
    }
}
