//! Modbus RTU register reads over a serial port
//!
//! Frame layout for function 0x03/0x04:
//! - request: unit, function, address (BE u16), count (BE u16), CRC-16 (LE)
//! - response: unit, function, byte count, `count` BE u16 registers, CRC-16 (LE)
//! - exception: unit, function | 0x80, exception code, CRC-16 (LE)
//!
//! Only what the sampler needs is implemented: one read-registers exchange
//! per call, validated by unit, function, byte count and CRC.

use super::transport::{RegisterRequest, RegisterTransport};
use crate::config::SerialSettings;
use crate::error::{DataLogError, Result};
use serialport::SerialPort;
use std::io::{Read, Write};

/// Length of an exception response
const EXCEPTION_FRAME_LEN: usize = 5;

/// Largest register count a single RTU read may request
pub const MAX_READ_REGISTERS: u16 = 125;

/// Modbus CRC-16 (poly 0xA001 reflected, init 0xFFFF)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= *byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

fn check_crc(frame: &[u8]) -> Result<()> {
    if frame.len() < 3 {
        return Err(DataLogError::Protocol(format!(
            "frame too short for CRC ({} bytes)",
            frame.len()
        )));
    }
    let (body, tail) = frame.split_at(frame.len() - 2);
    let received = u16::from_le_bytes([tail[0], tail[1]]);
    let expected = crc16(body);
    if received != expected {
        return Err(DataLogError::Protocol(format!(
            "CRC mismatch: expected {:04X}, got {:04X}",
            expected, received
        )));
    }
    Ok(())
}

/// Encode a read-registers request frame
pub fn encode_read_request(request: &RegisterRequest) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8);
    frame.push(request.unit_address);
    frame.push(request.function_code);
    frame.extend_from_slice(&request.register_address.to_be_bytes());
    frame.extend_from_slice(&request.register_count.to_be_bytes());
    append_crc(&mut frame);
    frame
}

/// Length of a normal response to `request`
pub fn expected_response_len(request: &RegisterRequest) -> usize {
    5 + 2 * request.register_count as usize
}

/// Decode a complete response frame into register values
pub fn decode_read_response(request: &RegisterRequest, frame: &[u8]) -> Result<Vec<u16>> {
    if frame.len() >= 2 && frame[1] == (request.function_code | 0x80) {
        check_crc(&frame[..frame.len().min(EXCEPTION_FRAME_LEN)])?;
        let code = frame.get(2).copied().unwrap_or(0);
        return Err(DataLogError::Protocol(format!(
            "unit {} returned exception code {:#04x}",
            request.unit_address, code
        )));
    }

    let expected_len = expected_response_len(request);
    if frame.len() != expected_len {
        return Err(DataLogError::Protocol(format!(
            "expected {} byte response, got {}",
            expected_len,
            frame.len()
        )));
    }
    check_crc(frame)?;

    if frame[0] != request.unit_address {
        return Err(DataLogError::Protocol(format!(
            "response from unit {}, expected {}",
            frame[0], request.unit_address
        )));
    }
    if frame[1] != request.function_code {
        return Err(DataLogError::Protocol(format!(
            "response function {:#04x}, expected {:#04x}",
            frame[1], request.function_code
        )));
    }
    let byte_count = frame[2] as usize;
    if byte_count != 2 * request.register_count as usize {
        return Err(DataLogError::Protocol(format!(
            "byte count {} does not match {} registers",
            byte_count, request.register_count
        )));
    }

    Ok(frame[3..3 + byte_count]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// Modbus RTU transport over one serial port
pub struct SerialTransport {
    /// Port name, for error messages
    port_name: String,
    /// Open port, `None` after close
    port: Option<Box<dyn SerialPort>>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port_name", &self.port_name)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialTransport {
    /// Open and configure a serial port
    pub fn open(port_name: &str, settings: &SerialSettings) -> Result<Self> {
        let data_bits = settings.serial_data_bits().ok_or_else(|| {
            DataLogError::transport(port_name, format!("invalid data bits {}", settings.data_bits))
        })?;
        let stop_bits = settings.serial_stop_bits().ok_or_else(|| {
            DataLogError::transport(port_name, format!("invalid stop bits {}", settings.stop_bits))
        })?;

        let port = serialport::new(port_name, settings.baud_rate)
            .data_bits(data_bits)
            .parity(settings.parity.into())
            .stop_bits(stop_bits)
            .flow_control(serialport::FlowControl::None)
            .timeout(settings.timeout())
            .open()
            .map_err(|e| DataLogError::transport(port_name, e))?;

        tracing::info!(
            "Opened {} at {} baud ({}{:?}{})",
            port_name,
            settings.baud_rate,
            settings.data_bits,
            settings.parity,
            settings.stop_bits
        );

        Ok(Self {
            port_name: port_name.to_string(),
            port: Some(port),
        })
    }
}

/// Map an I/O failure on `port_name`; a read timeout becomes `Timeout`
fn io_error(port_name: &str, err: std::io::Error) -> DataLogError {
    if err.kind() == std::io::ErrorKind::TimedOut {
        DataLogError::Timeout(format!("no response on {}", port_name))
    } else {
        DataLogError::transport(port_name, err)
    }
}

impl RegisterTransport for SerialTransport {
    fn read_registers(&mut self, request: &RegisterRequest) -> Result<Vec<u16>> {
        if request.register_count == 0 || request.register_count > MAX_READ_REGISTERS {
            return Err(DataLogError::Protocol(format!(
                "cannot read {} registers in one request",
                request.register_count
            )));
        }

        let frame = encode_read_request(request);
        let port_name = self.port_name.as_str();
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| DataLogError::transport(port_name, "port is closed"))?;

        // Stale bytes from a previous timed-out exchange would misalign the frame
        let _ = port.clear(serialport::ClearBuffer::Input);

        port.write_all(&frame)
            .and_then(|_| port.flush())
            .map_err(|e| io_error(port_name, e))?;

        let mut response = vec![0u8; expected_response_len(request)];
        port.read_exact(&mut response[..EXCEPTION_FRAME_LEN])
            .map_err(|e| io_error(port_name, e))?;

        if response[1] & 0x80 != 0 {
            return decode_read_response(request, &response[..EXCEPTION_FRAME_LEN]);
        }

        port.read_exact(&mut response[EXCEPTION_FRAME_LEN..])
            .map_err(|e| io_error(port_name, e))?;

        decode_read_response(request, &response)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::info!("Closed serial port {}", self.port_name);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(unit: u8, address: u16, count: u16) -> RegisterRequest {
        RegisterRequest {
            unit_address: unit,
            function_code: 0x03,
            register_address: address,
            register_count: count,
        }
    }

    fn response(unit: u8, function: u8, registers: &[u16]) -> Vec<u8> {
        let mut frame = vec![unit, function, (registers.len() * 2) as u8];
        for reg in registers {
            frame.extend_from_slice(&reg.to_be_bytes());
        }
        append_crc(&mut frame);
        frame
    }

    #[test]
    fn test_crc16_known_vectors() {
        assert_eq!(
            encode_read_request(&request(1, 0, 1)),
            vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]
        );
        assert_eq!(
            encode_read_request(&request(1, 0, 10)),
            vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]
        );
    }

    #[test]
    fn test_encode_register_address() {
        let frame = encode_read_request(&request(2, 512, 3));
        assert_eq!(&frame[..6], &[0x02, 0x03, 0x02, 0x00, 0x00, 0x03]);
        assert!(check_crc(&frame).is_ok());
    }

    #[test]
    fn test_decode_response() {
        let req = request(2, 0, 2);
        let frame = response(2, 0x03, &[0x1234, 4096]);
        assert_eq!(expected_response_len(&req), frame.len());
        assert_eq!(decode_read_response(&req, &frame).unwrap(), vec![0x1234, 4096]);
    }

    #[test]
    fn test_decode_rejects_bad_crc() {
        let req = request(1, 0, 1);
        let mut frame = response(1, 0x03, &[42]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        let err = decode_read_response(&req, &frame).unwrap_err();
        assert!(err.to_string().contains("CRC"));
    }

    #[test]
    fn test_decode_rejects_wrong_unit() {
        let req = request(1, 0, 1);
        let frame = response(3, 0x03, &[42]);
        assert!(decode_read_response(&req, &frame).is_err());
    }

    #[test]
    fn test_decode_exception() {
        let req = request(1, 0, 1);
        let mut frame = vec![0x01, 0x83, 0x02];
        append_crc(&mut frame);
        let err = decode_read_response(&req, &frame).unwrap_err();
        assert!(err.to_string().contains("exception"));
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let req = request(1, 0, 2);
        let frame = response(1, 0x03, &[1]);
        assert!(decode_read_response(&req, &frame).is_err());
    }

    #[test]
    fn test_io_error_mapping() {
        let timeout = io_error("COM4", std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(timeout.is_timeout());
        assert!(timeout.to_string().contains("COM4"));

        let broken = io_error("COM4", std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(matches!(broken, DataLogError::Transport { ref port, .. } if port == "COM4"));
    }
}
