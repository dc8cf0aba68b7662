//! ComLynx serial port.
//!
//! An 11-bit frame transceiver (start + 8 data + parity/mark + stop)
//! clocked one bit-time per timer 4 underflow. ComLynx is an open
//! collector bus, so every transmitted frame is also received by the
//! sender; without a cable attached a program still sees its own traffic
//! echoed back, and that loopback frame is front-inserted so it arrives
//! ahead of anything a remote unit queued.
//!
//! `SERCTL` reads status bits that are unrelated to the bits it accepts
//! on write. The serial interrupt shares timer 4's bit in `INTSET` and is
//! level sensitive: as long as the ready condition holds, the bit
//! re-asserts on every UART tick no matter how often software clears it.

use emu_core::Serializer;

/// Bit 31 sentinel: countdown parked, transmitter idle.
const TX_INACTIVE: u32 = 0x8000_0000;
/// Bit 31 sentinel: countdown parked, receiver idle.
const RX_INACTIVE: u32 = 0x8000_0000;
/// Timer 4 ticks per serial frame.
const TX_PERIOD: u32 = 11;
const RX_PERIOD: u32 = 11;
/// Extra gap between queued frames, so a burst is delivered at wire pace
/// (11 + 44 = 55 ticks per queued frame) instead of all at once.
const RX_NEXT_DELAY: u32 = 44;
/// RX queue depth. Power of two, the pointers wrap bitwise.
const QUEUE_LEN: usize = 32;

/// Bit 15 flags a break condition in received data.
pub(crate) const BREAK_CODE: u16 = 0x8000;

pub(crate) struct Uart {
    /// Raw value last written to `SERCTL`.
    control: u8,
    tx_countdown: u32,
    rx_countdown: u32,
    tx_data: u16,
    rx_data: u16,
    rx_ready: bool,
    tx_irq_enable: bool,
    rx_irq_enable: bool,
    parity_enable: bool,
    parity_even: bool,
    send_break: bool,
    overrun_error: bool,
    framing_error: bool,
    queue: [u16; QUEUE_LEN],
    input_ptr: u32,
    output_ptr: u32,
    waiting: u32,
}

impl Uart {
    pub(crate) fn new() -> Self {
        Self {
            control: 0,
            tx_countdown: TX_INACTIVE,
            rx_countdown: RX_INACTIVE,
            tx_data: 0,
            rx_data: 0,
            rx_ready: false,
            tx_irq_enable: false,
            rx_irq_enable: false,
            parity_enable: false,
            parity_even: false,
            send_break: false,
            overrun_error: false,
            framing_error: false,
            queue: [0; QUEUE_LEN],
            input_ptr: 0,
            output_ptr: 0,
            waiting: 0,
        }
    }

    /// Advance one bit-time. Called on every timer 4 underflow.
    pub(crate) fn tick(&mut self) {
        // Receive: countdown expiry delivers the next queued frame.
        if self.rx_countdown == 0 {
            if self.waiting > 0 {
                if self.rx_ready {
                    // Previous frame never read before the next arrived.
                    self.overrun_error = true;
                }
                self.rx_data = self.queue[self.output_ptr as usize];
                self.output_ptr = (self.output_ptr + 1) & (QUEUE_LEN as u32 - 1);
                self.waiting -= 1;
                self.rx_ready = true;
                self.rx_countdown = if self.waiting > 0 {
                    RX_PERIOD + RX_NEXT_DELAY
                } else {
                    RX_INACTIVE
                };
            }
        } else if self.rx_countdown & RX_INACTIVE == 0 {
            self.rx_countdown -= 1;
        }

        // Transmit: a break retransmits itself for as long as the TXBRK
        // control bit stays set, ordinary data goes idle.
        if self.tx_countdown == 0 {
            if self.send_break {
                self.tx_data = BREAK_CODE;
                self.tx_countdown = TX_PERIOD;
                self.loopback(BREAK_CODE);
            } else {
                self.tx_countdown = TX_INACTIVE;
            }
        } else if self.tx_countdown & TX_INACTIVE == 0 {
            self.tx_countdown -= 1;
        }
    }

    /// `SERCTL` status byte: TXRDY+TXEMPTY, RXRDY, the error flags, and
    /// the break/ninth bits of the last received frame.
    pub(crate) fn status(&self) -> u8 {
        let mut status = 0;
        if self.tx_countdown & TX_INACTIVE != 0 {
            status |= 0xA0;
        }
        if self.rx_ready {
            status |= 0x40;
        }
        if self.overrun_error {
            status |= 0x08;
        }
        if self.framing_error {
            status |= 0x04;
        }
        if self.rx_data & BREAK_CODE != 0 {
            status |= 0x02;
        }
        if self.rx_data & 0x0100 != 0 {
            status |= 0x01;
        }
        status
    }

    /// `SERCTL` write. The caller refreshes the serial interrupt after.
    pub(crate) fn write_control(&mut self, value: u8) {
        self.control = value;
        self.tx_irq_enable = value & 0x80 != 0;
        self.rx_irq_enable = value & 0x40 != 0;
        self.parity_enable = value & 0x10 != 0;
        self.parity_even = value & 0x01 != 0;

        // RESETERR strobe.
        if value & 0x08 != 0 {
            self.overrun_error = false;
            self.framing_error = false;
        }

        self.send_break = value & 0x02 != 0;
        if self.send_break {
            self.tx_countdown = TX_PERIOD;
            self.loopback(BREAK_CODE);
        }
    }

    /// `SERDAT` read: returns the received byte and clears RXRDY. The
    /// caller refreshes the serial interrupt after.
    pub(crate) fn read_data(&mut self) -> u8 {
        self.rx_ready = false;
        (self.rx_data & 0xFF) as u8
    }

    /// `SERDAT` read without the RXRDY side effect.
    pub(crate) fn peek_data(&self) -> u8 {
        (self.rx_data & 0xFF) as u8
    }

    /// `SERDAT` write: start transmitting one frame. With parity disabled
    /// the PAREVEN control bit is sent as-is in the ninth bit.
    pub(crate) fn write_data(&mut self, value: u8) {
        self.tx_data = u16::from(value);
        if !self.parity_enable && self.parity_even {
            self.tx_data |= 0x0100;
        }
        self.tx_countdown = TX_PERIOD;
        let data = self.tx_data;
        self.loopback(data);
    }

    /// Frame arriving from a remote unit: back-insert into the queue.
    /// A full queue silently drops the frame.
    pub(crate) fn receive(&mut self, data: u16) {
        if self.waiting >= QUEUE_LEN as u32 {
            return;
        }
        if self.waiting == 0 {
            self.rx_countdown = RX_PERIOD;
        }
        self.queue[self.input_ptr as usize] = data;
        self.input_ptr = (self.input_ptr + 1) & (QUEUE_LEN as u32 - 1);
        self.waiting += 1;
    }

    /// The mandatory self-loopback: front-insert so the sender reads its
    /// own frame ahead of queued remote data.
    fn loopback(&mut self, data: u16) {
        if self.waiting >= QUEUE_LEN as u32 {
            return;
        }
        if self.waiting == 0 {
            self.rx_countdown = RX_PERIOD;
        }
        self.output_ptr = self.output_ptr.wrapping_sub(1) & (QUEUE_LEN as u32 - 1);
        self.queue[self.output_ptr as usize] = data;
        self.waiting += 1;
    }

    /// Level condition for the serial interrupt: transmitter idle with TX
    /// interrupts enabled, or a received frame ready with RX interrupts
    /// enabled.
    pub(crate) fn irq_asserted(&self) -> bool {
        let tx_idle = self.tx_countdown == 0 || self.tx_countdown & TX_INACTIVE != 0;
        (tx_idle && self.tx_irq_enable) || (self.rx_ready && self.rx_irq_enable)
    }

    pub(crate) fn serialize(&mut self, s: &mut Serializer) {
        s.u8(&mut self.control);
        s.u32(&mut self.tx_countdown);
        s.u32(&mut self.rx_countdown);
        s.u16(&mut self.tx_data);
        s.u16(&mut self.rx_data);
        s.bool(&mut self.rx_ready);
        s.bool(&mut self.tx_irq_enable);
        s.bool(&mut self.rx_irq_enable);
        s.bool(&mut self.parity_enable);
        s.bool(&mut self.parity_even);
        s.bool(&mut self.send_break);
        s.bool(&mut self.overrun_error);
        s.bool(&mut self.framing_error);
        for slot in &mut self.queue {
            s.u16(slot);
        }
        s.u32(&mut self.input_ptr);
        s.u32(&mut self.output_ptr);
        s.u32(&mut self.waiting);
    }
}
