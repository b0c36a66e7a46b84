//! Byte oriented access to the UART the thermostat is attached to.
//!
//! The drivers only need a handful of primitives modelled after the Arduino
//! style serial API: write, flush, check availability and non-blocking
//! single byte reads. Waiting goes through [`Transport::delay`] so that hosts
//! (and tests) can substitute their own clock.
use std::{io, time::Duration};

pub trait Transport {
    /// Queues all bytes for transmission.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Blocks until all queued bytes have been transmitted.
    fn flush(&mut self) -> io::Result<()>;

    /// Number of received bytes that can be read without blocking.
    fn available(&mut self) -> io::Result<usize>;

    /// Reads one byte if one is available, never blocks.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Reads up to `buf.len()` immediately available bytes.
    fn read_array(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read_byte()? {
                Some(byte) => {
                    buf[filled] = byte;
                    filled += 1;
                }
                None => break,
            }
        }
        Ok(filled)
    }

    /// Discards everything currently buffered and returns the number of bytes dropped.
    fn drain(&mut self) -> io::Result<usize> {
        let mut dropped = 0;
        while self.available()? > 0 {
            match self.read_byte()? {
                Some(_) => dropped += 1,
                None => break,
            }
        }
        Ok(dropped)
    }

    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-memory transport and small emulations of both thermostat firmwares.
    use super::Transport;
    use std::{
        cell::RefCell,
        collections::{HashMap, VecDeque},
        io,
        rc::Rc,
        time::Duration,
    };

    /// Called with everything written since the previous flush, returns the device reply.
    pub(crate) type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8>>;

    #[derive(Default)]
    pub(crate) struct MockTransport {
        pub written: Vec<u8>,
        pub delays: Vec<Duration>,
        pending: Vec<u8>,
        inbound: VecDeque<u8>,
        arrivals: VecDeque<Vec<u8>>,
        responder: Option<Responder>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Bytes already sitting in the receive buffer.
        pub fn with_inbound(bytes: &[u8]) -> Self {
            let mut transport = Self::new();
            transport.inbound.extend(bytes);
            transport
        }

        /// Bytes arriving during the next not yet consumed `delay()`.
        pub fn schedule(mut self, chunk: &[u8]) -> Self {
            self.arrivals.push_back(chunk.to_vec());
            self
        }

        pub fn respond_with(mut self, responder: Responder) -> Self {
            self.responder = Some(responder);
            self
        }

        pub fn written_str(&self) -> String {
            String::from_utf8_lossy(&self.written).into_owned()
        }

        pub fn remaining(&self) -> Vec<u8> {
            self.inbound.iter().copied().collect()
        }

        pub fn total_delay(&self) -> Duration {
            self.delays.iter().sum()
        }
    }

    impl Transport for MockTransport {
        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.extend_from_slice(bytes);
            self.pending.extend_from_slice(bytes);
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            let pending = std::mem::take(&mut self.pending);
            if let Some(responder) = self.responder.as_mut() {
                let reply = responder(&pending);
                self.inbound.extend(reply);
            }
            Ok(())
        }

        fn available(&mut self) -> io::Result<usize> {
            Ok(self.inbound.len())
        }

        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            Ok(self.inbound.pop_front())
        }

        fn delay(&mut self, duration: Duration) {
            self.delays.push(duration);
            if let Some(chunk) = self.arrivals.pop_front() {
                self.inbound.extend(chunk);
            }
        }
    }

    fn lines(written: &[u8]) -> impl Iterator<Item = &[u8]> {
        written
            .split(|b| *b == b'\n' || *b == b'\r')
            .filter(|line| !line.is_empty())
    }

    /// Register map of a hardware revision 1 thermostat.
    pub(crate) type Registers = Rc<RefCell<HashMap<u16, u16>>>;

    /// Answers `W`/`R` commands like an HR20 V1 and anything else with noise.
    pub(crate) fn register_device(registers: Registers) -> Responder {
        Box::new(move |written| {
            let mut reply = Vec::new();
            for line in lines(written) {
                let text = String::from_utf8_lossy(line);
                let address = text.get(1..4).and_then(|a| u16::from_str_radix(a, 16).ok());
                match (line[0], address, text.len()) {
                    (b'W', Some(address), 8) => {
                        if let Ok(value) = u16::from_str_radix(&text[4..8], 16) {
                            registers.borrow_mut().insert(address, value);
                        }
                        let echo = if text == "W20C100F" {
                            "M20C1000".to_string()
                        } else {
                            format!("M{}", &text[1..])
                        };
                        reply.extend_from_slice(echo.as_bytes());
                        reply.extend_from_slice(b"\r\n");
                    }
                    (b'R', Some(address), 4) => {
                        let value = registers.borrow().get(&address).copied().unwrap_or(0);
                        reply.extend_from_slice(format!("M{}{value:04X}\r\n", &text[1..]).as_bytes());
                    }
                    _ => reply.extend_from_slice(b"?\r\n"),
                }
            }
            reply
        })
    }

    /// State of an OpenHR20 thermostat, temperatures in tenths of a degree.
    #[derive(Debug, Clone)]
    pub(crate) struct OpenHr20State {
        pub desired: u16,
        pub current: u16,
        pub battery: u16,
        pub valve: u8,
        pub mode: char,
    }

    impl Default for OpenHr20State {
        fn default() -> Self {
            Self {
                desired: 225,
                current: 210,
                battery: 3200,
                valve: 45,
                mode: 'A',
            }
        }
    }

    impl OpenHr20State {
        /// Status line as printed by the OpenHR20 firmware on `D`.
        pub fn status_line(&self) -> String {
            format!(
                "D: d6 17.10.26 12:00:00 {} V: {} I: {:04} S: {:04} B: {} Is: 00000000 X\r\n",
                self.mode,
                self.valve,
                u32::from(self.current) * 10,
                u32::from(self.desired) * 10,
                self.battery
            )
        }
    }

    /// Answers `D`, `A<hex>` and `M0x` like the OpenHR20 firmware.
    pub(crate) fn open_hr20_device(state: Rc<RefCell<OpenHr20State>>) -> Responder {
        Box::new(move |written| {
            let mut reply = Vec::new();
            for line in lines(written) {
                match line {
                    b"D" => reply.extend_from_slice(state.borrow().status_line().as_bytes()),
                    b"M00" => state.borrow_mut().mode = 'M',
                    b"M01" => state.borrow_mut().mode = 'A',
                    [b'A', step @ ..] => {
                        if let Ok(step) =
                            u16::from_str_radix(&String::from_utf8_lossy(step), 16)
                        {
                            state.borrow_mut().desired = step * 5;
                        }
                    }
                    _ => {}
                }
            }
            reply
        })
    }
}
