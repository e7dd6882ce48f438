//! Grove LCD RGB Backlight module: HD44780-compatible LCD controller
//! plus the RGB backlight controller that ships next to it on the bus.

pub mod driver;

pub use driver::*;

/// HD44780 controller opcodes and their flag groups.
///
/// Each opcode may be OR-combined with flags from its own group below;
/// mixing groups is not checked here and produces undefined controller
/// behavior.
pub mod cmd {
    /// Clear the display.
    pub const CLEAR: u8 = 0x01;
    /// Move the cursor to the home position, display unchanged.
    pub const CURSOR_HOME: u8 = 0x02;
    /// Set the cursor move direction.
    pub const ENTRY_MODE_SET: u8 = 0x04;
    /// Display, cursor and blink on/off.
    pub const DISPLAY_CONTROL: u8 = 0x08;
    /// Move the cursor or shift the whole display.
    pub const SHIFT: u8 = 0x10;
    /// Set bus width, line count and font.
    pub const FUNCTION_SET: u8 = 0x20;
    /// Set the CGRAM address (6 address bits).
    pub const SET_CGRAM_ADDR: u8 = 0x40;
    /// Set the DDRAM address (7 address bits).
    pub const SET_DDRAM_ADDR: u8 = 0x80;

    // Entry mode flags (OR with ENTRY_MODE_SET).
    pub const ENTRY_LEFT: u8 = 0x02;
    pub const ENTRY_RIGHT: u8 = 0x00;
    pub const ENTRY_SHIFT_INCREMENT: u8 = 0x01;
    pub const ENTRY_SHIFT_DECREMENT: u8 = 0x00;

    // Display control flags (OR with DISPLAY_CONTROL).
    pub const DISPLAY_ON: u8 = 0x04;
    pub const DISPLAY_OFF: u8 = 0x00;
    pub const CURSOR_ON: u8 = 0x02;
    pub const CURSOR_OFF: u8 = 0x00;
    pub const BLINK_ON: u8 = 0x01;
    pub const BLINK_OFF: u8 = 0x00;

    // Shift flags (OR with SHIFT).
    pub const DISPLAY_MOVE: u8 = 0x08;
    pub const CURSOR_MOVE: u8 = 0x00;
    pub const MOVE_RIGHT: u8 = 0x04;
    pub const MOVE_LEFT: u8 = 0x00;

    // Function set flags (OR with FUNCTION_SET).
    pub const MODE_8BIT: u8 = 0x10;
    pub const MODE_4BIT: u8 = 0x00;
    pub const LINES_2: u8 = 0x08;
    pub const LINES_1: u8 = 0x00;
    pub const FONT_5X10: u8 = 0x04;
    pub const FONT_5X8: u8 = 0x00;
}
