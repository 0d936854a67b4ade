//! The binary command protocol on the I²C slave endpoint.
//!
//! The slave interrupt feeds [`SlaveEvent`]s into [`SlaveEndpoint`], which
//! reassembles transactions: a start condition resets the buffer, each data
//! byte is appended, and the packet is queued as soon as the byte count
//! reaches the custom parameter count declared for the leading command code.
//! The dispatcher task validates the code against the table, assembles the
//! handler's parameters (static first, then the received bytes), and streams
//! the response: first the declared return count, then the single return
//! byte when one is declared.

use crate::devices::Ctx;
use crate::handlers::poll_verify;
use once_cell::sync::Lazy;
use std::time::Duration;
use switch_types::{layout, SystemFlags};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Reassembly buffer size; transactions beyond it wrap back to zero.
pub const BUFFER_SIZE: usize = 50;

/// Queue depth between the slave endpoint and the dispatcher.
pub const QUEUE_DEPTH: usize = 5;

/// Pause between response bytes, per the bus timing.
const SLAVE_SEND_DELAY: Duration = Duration::from_micros(40);

/// One event from the I²C slave interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveEvent {
    Start,
    Data(u8),
    Stop,
}

/// A reassembled transaction: the command code followed by its parameters.
#[derive(Debug, Clone)]
pub struct I2cPacket {
    pub bytes: Vec<u8>,
}

/// Typed dispatch for the code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cHandlerKind {
    /// Read or write a controller register.
    WriteRead,
    /// Save the running configuration to the EEPROM.
    SaveConfig,
    /// Stream the 256 controller registers to the master.
    DownloadConfig,
    /// Zero the saved configuration region.
    ClearConfig,
    SetBit,
    ClearBit,
    SetSelfClearing,
    /// Reserved slot; accepted and answered with zero.
    NotImplemented,
}

/// One entry of the code table.
#[derive(Debug, Clone)]
pub struct I2cCode {
    pub code: u8,
    pub static_params: Vec<u8>,
    pub custom_count: u8,
    pub return_count: u8,
    pub handler: I2cHandlerKind,
}

fn entry(
    code: u8,
    static_params: &[u8],
    custom_count: u8,
    return_count: u8,
    handler: I2cHandlerKind,
) -> I2cCode {
    I2cCode {
        code,
        static_params: static_params.to_vec(),
        custom_count,
        return_count,
        handler,
    }
}

fn reserved(code: u8) -> I2cCode {
    entry(code, &[], 0, 0, I2cHandlerKind::NotImplemented)
}

/// Sixteen quick-control codes for one port block. Within a block the low
/// nibble selects the operation; the block's port base is baked into the
/// static parameters.
fn port_block(code_base: u8, port_base: u8) -> Vec<I2cCode> {
    use I2cHandlerKind::*;
    const CONTROL2: u8 = switch_types::regs::PORT_CONTROL2_OFFSET;
    const CONTROL5: u8 = switch_types::regs::PORT_CONTROL5_OFFSET;
    const CONTROL6: u8 = switch_types::regs::PORT_CONTROL6_OFFSET;

    vec![
        // Port on / off.
        entry(code_base, &[port_base, CONTROL6, 0x03], 0, 1, ClearBit),
        entry(code_base + 0x1, &[port_base, CONTROL6, 0x03], 0, 1, SetBit),
        // Duplex.
        entry(code_base + 0x2, &[port_base, CONTROL5, 0x05], 0, 1, SetBit),
        entry(code_base + 0x3, &[port_base, CONTROL5, 0x05], 0, 1, ClearBit),
        // Speed.
        entry(code_base + 0x4, &[port_base, CONTROL5, 0x06], 0, 1, ClearBit),
        entry(code_base + 0x5, &[port_base, CONTROL5, 0x06], 0, 1, SetBit),
        // Auto MDI/MDI-X.
        entry(code_base + 0x6, &[port_base, CONTROL6, 0x02], 0, 1, ClearBit),
        entry(code_base + 0x7, &[port_base, CONTROL6, 0x02], 0, 1, SetBit),
        // Restart auto-negotiation.
        entry(code_base + 0x8, &[port_base, CONTROL6, 0x05], 0, 1, SetSelfClearing),
        // TX / RX gating.
        entry(code_base + 0x9, &[port_base, CONTROL2, 0x02], 0, 1, SetBit),
        entry(code_base + 0xA, &[port_base, CONTROL2, 0x02], 0, 1, ClearBit),
        entry(code_base + 0xB, &[port_base, CONTROL2, 0x01], 0, 1, SetBit),
        entry(code_base + 0xC, &[port_base, CONTROL2, 0x01], 0, 1, ClearBit),
        // Diagnostics, VLAN and status slots are not wired up yet.
        entry(code_base + 0xD, &[], 0, 2, NotImplemented),
        entry(code_base + 0xE, &[], 0, 1, NotImplemented),
        entry(code_base + 0xF, &[], 0, 1, NotImplemented),
    ]
}

/// The code table: administrative codes 0x00-0x0F, then four port blocks.
/// Codes beyond the table are dropped by the dispatcher.
pub static CODE_TABLE: Lazy<Vec<I2cCode>> = Lazy::new(|| {
    use I2cHandlerKind::*;
    let mut table = vec![
        entry(0x00, &[], 3, 1, WriteRead),
        entry(0x01, &[], 0, 1, SaveConfig),
        entry(0x02, &[], 0, 0xFF, DownloadConfig),
        entry(0x03, &[], 0, 1, ClearConfig),
    ];
    for code in 0x04..=0x0F {
        table.push(reserved(code));
    }
    // The I²C port numbering follows the front panel, so block 1 lands on
    // the hardware base of logical f0.
    table.extend(port_block(0x10, 0x40));
    table.extend(port_block(0x20, 0x30));
    table.extend(port_block(0x30, 0x20));
    table.extend(port_block(0x40, 0x10));
    table
});

/// Looks up the expected custom parameter count for a leading code byte.
fn custom_count(code: u8) -> u8 {
    CODE_TABLE
        .get(code as usize)
        .map(|entry| entry.custom_count)
        .unwrap_or(0)
}

/// Reassembles slave interrupt events into queued packets.
pub struct SlaveEndpoint {
    rx: mpsc::Receiver<SlaveEvent>,
    queue: mpsc::Sender<I2cPacket>,
    buffer: [u8; BUFFER_SIZE],
    index: usize,
}

impl SlaveEndpoint {
    pub fn new(rx: mpsc::Receiver<SlaveEvent>, queue: mpsc::Sender<I2cPacket>) -> Self {
        SlaveEndpoint {
            rx,
            queue,
            buffer: [0; BUFFER_SIZE],
            index: 0,
        }
    }

    /// Consumes events until the interrupt feed closes.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            self.on_event(event);
        }
    }

    /// Processes one interrupt event.
    pub fn on_event(&mut self, event: SlaveEvent) {
        match event {
            SlaveEvent::Start => self.index = 0,
            SlaveEvent::Data(byte) => {
                self.buffer[self.index] = byte;
                if self.index >= custom_count(self.buffer[0]) as usize {
                    let packet = I2cPacket {
                        bytes: self.buffer[..=self.index].to_vec(),
                    };
                    debug!("I2C packet queued for code 0x{:02X}", packet.bytes[0]);
                    if self.queue.try_send(packet).is_err() {
                        warn!("I2C packet queue full; packet dropped");
                    }
                }
                self.index += 1;
                if self.index >= BUFFER_SIZE {
                    self.index = 0;
                }
            }
            SlaveEvent::Stop => {}
        }
    }
}

/// The dispatcher task: validates, executes, responds.
pub struct I2cDispatcher {
    ctx: Ctx,
    rx: mpsc::Receiver<I2cPacket>,
    responses: mpsc::Sender<u8>,
    bus: Mutex<()>,
}

impl I2cDispatcher {
    pub fn new(ctx: Ctx, rx: mpsc::Receiver<I2cPacket>, responses: mpsc::Sender<u8>) -> Self {
        I2cDispatcher {
            ctx,
            rx,
            responses,
            bus: Mutex::new(()),
        }
    }

    /// Consumes packets until the queue closes.
    pub async fn run(mut self) {
        while let Some(packet) = self.rx.recv().await {
            self.handle(&packet).await;
        }
    }

    /// Dispatches one packet. Exposed so tests can step the task.
    pub async fn handle(&self, packet: &I2cPacket) {
        let code = packet.bytes[0];
        let Some(entry) = CODE_TABLE.get(code as usize) else {
            debug!("unknown I2C code 0x{code:02X} dropped");
            return;
        };
        if entry.code != code {
            debug!("mismatched I2C slot for code 0x{code:02X} dropped");
            return;
        }

        let mut params = entry.static_params.clone();
        params.extend_from_slice(
            &packet.bytes[1..packet.bytes.len().min(1 + entry.custom_count as usize)],
        );

        let _bus = self.bus.lock().await;
        tokio::time::sleep(SLAVE_SEND_DELAY).await;
        let _ = self.responses.send(entry.return_count).await;

        let value = self.execute(entry.handler, &params).await;
        if entry.return_count == 1 {
            tokio::time::sleep(SLAVE_SEND_DELAY).await;
            let _ = self.responses.send(value).await;
        }
        self.ctx
            .console
            .write(&format!("\nI2CFunctionReturned: 0x{value:02X}\n"));
    }

    async fn execute(&self, handler: I2cHandlerKind, params: &[u8]) -> u8 {
        let result = match handler {
            I2cHandlerKind::WriteRead => self.write_read(params).await,
            I2cHandlerKind::SaveConfig => self.save_config().await,
            I2cHandlerKind::DownloadConfig => self.download_config().await,
            I2cHandlerKind::ClearConfig => self.clear_config().await,
            I2cHandlerKind::SetBit => self.set_bit(params, true).await,
            I2cHandlerKind::ClearBit => self.set_bit(params, false).await,
            I2cHandlerKind::SetSelfClearing => self.set_self_clearing(params).await,
            I2cHandlerKind::NotImplemented => Ok(0),
        };
        match result {
            Ok(value) => value,
            Err(err) => {
                warn!("I2C handler failed: {err}");
                0
            }
        }
    }

    /// `[reg, data, write?]` - register access; returns the written or read
    /// byte.
    async fn write_read(&self, params: &[u8]) -> crate::SwitchdResult<u8> {
        let reg = params[0];
        let data = params[1];
        if params[2] != 0 {
            self.ctx.controller().write(reg, data).await?;
            Ok(data)
        } else {
            Ok(self.ctx.controller().read(reg).await?)
        }
    }

    /// `[base, offset, bit]` - sets or clears the bit, poll-verifying clears
    /// the way the console path does.
    async fn set_bit(&self, params: &[u8], set: bool) -> crate::SwitchdResult<u8> {
        let reg = params[0].wrapping_add(params[1]);
        let bit = params[2];
        let current = self.ctx.controller().read(reg).await?;
        let value = if set {
            current | (1 << bit)
        } else {
            current & !(1 << bit)
        };
        self.ctx.controller().write(reg, value).await?;
        if !set {
            poll_verify(&self.ctx, reg, value).await?;
        }
        Ok(1)
    }

    /// `[base, offset, bit]` - pulses a self-clearing bit and waits for the
    /// device to drop it.
    async fn set_self_clearing(&self, params: &[u8]) -> crate::SwitchdResult<u8> {
        let reg = params[0].wrapping_add(params[1]);
        let bit = params[2];
        let value = self.ctx.controller().read(reg).await? | (1 << bit);
        self.ctx.controller().write(reg, value).await?;
        poll_verify(&self.ctx, reg, value & !(1 << bit)).await?;
        Ok(1)
    }

    /// Copies the controller registers into the EEPROM image and marks the
    /// configuration saved.
    async fn save_config(&self) -> crate::SwitchdResult<u8> {
        let hostname = self.ctx.state.read().await.hostname.clone();
        self.ctx
            .console
            .write(&format!("\nI2C Requested Configuration Save\n{hostname}>"));

        for reg in 0..=0xFFu16 {
            let data = self.ctx.controller().read(reg as u8).await?;
            self.ctx
                .eeprom()
                .write(layout::SWITCH_CONFIG_BASE + reg as u32, data)
                .await?;
            tokio::time::sleep(crate::delays::SHORT).await;
        }
        let mut flags =
            SystemFlags::from_byte(self.ctx.eeprom().read(layout::FLAGS_ADDR).await?);
        flags.set(SystemFlags::CONFIG_SAVED);
        self.ctx
            .eeprom()
            .write(layout::FLAGS_ADDR, flags.as_byte())
            .await?;
        info!("configuration saved over I2C");
        Ok(1)
    }

    /// Streams every controller register to the master.
    async fn download_config(&self) -> crate::SwitchdResult<u8> {
        for reg in 0..=0xFFu16 {
            let data = self.ctx.controller().read(reg as u8).await?;
            tokio::time::sleep(SLAVE_SEND_DELAY).await;
            let _ = self.responses.send(data).await;
        }
        Ok(1)
    }

    /// Zeros the saved register image and drops the image-valid mark.
    async fn clear_config(&self) -> crate::SwitchdResult<u8> {
        for reg in 0..=0xFFu16 {
            self.ctx
                .eeprom()
                .write(layout::SWITCH_CONFIG_BASE + reg as u32, 0x00)
                .await?;
            tokio::time::sleep(crate::delays::SHORT).await;
        }
        let mut flags =
            SystemFlags::from_byte(self.ctx.eeprom().read(layout::FLAGS_ADDR).await?);
        flags.clear(0);
        self.ctx
            .eeprom()
            .write(layout::FLAGS_ADDR, flags.as_byte())
            .await?;
        Ok(1)
    }
}

/// Creates the queue between the slave endpoint and the dispatcher.
pub fn packet_channel() -> (mpsc::Sender<I2cPacket>, mpsc::Receiver<I2cPacket>) {
    mpsc::channel(QUEUE_DEPTH)
}
