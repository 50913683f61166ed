use std::io;
use std::sync::Arc;

use embedded_io_async::{Read, Write};
use mutexdev::{
    Device, DeviceConfig, DeviceError, DeviceNumber, IoSink, IoSource, TransferFault, UserSink,
};

fn new_device(capacity: usize) -> Arc<Device> {
    let config = DeviceConfig::default()
        .with_name("testdev")
        .with_capacity(capacity);
    Device::new(&config, DeviceNumber::new(240, 0))
}

// Sink that rejects every copy
struct BadAddress;

impl UserSink for BadAddress {
    fn copy_to_user(&mut self, _data: &[u8]) -> Result<(), TransferFault> {
        Err(TransferFault::new("bad address"))
    }
}

// Reader that fails after giving out `ok` bytes
struct FailingReader {
    ok: usize,
}

impl io::Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.ok == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "unmapped page"));
        }
        let n = self.ok.min(buf.len());
        buf[..n].fill(b'x');
        self.ok -= n;
        Ok(n)
    }
}

#[tokio::test]
async fn test_concrete_scenario() {
    let device = new_device(256);
    let session = device.open().unwrap();

    assert_eq!(session.write(b"hello").await.unwrap(), 5);
    assert_eq!(device.valid_len().await, 5);

    let data = session.read_vec(10).await.unwrap();
    assert_eq!(data, b"hello");
    assert_eq!(session.position(), 5);

    let data = session.read_vec(10).await.unwrap();
    assert!(data.is_empty());

    assert!(matches!(device.open(), Err(DeviceError::Busy)));

    session.close().await;
    let session = device.open().unwrap();
    assert_eq!(device.open_count().await, 1);
    session.close().await;
    assert_eq!(device.open_count().await, 0);
}

#[tokio::test]
async fn test_round_trip_in_fresh_session() {
    let device = new_device(256);
    let payload = b"The quick brown fox";

    let writer = device.open().unwrap();
    assert_eq!(writer.write(payload).await.unwrap(), payload.len());
    writer.close().await;

    let reader = device.open().unwrap();
    let mut buf = [0u8; 64];
    let n = reader.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], payload);
    assert_eq!(device.valid_len().await, payload.len());
    reader.close().await;
}

#[tokio::test]
async fn test_read_past_valid_length_is_eof() {
    let device = new_device(32);
    let session = device.open().unwrap();
    session.write(b"abc").await.unwrap();

    for pos in [3, 4, 31, 1000] {
        session.seek(pos);
        let mut buf = [0u8; 8];
        assert_eq!(session.read(&mut buf).await, Ok(0));
        assert_eq!(session.position(), pos);
    }
    session.close().await;
}

#[tokio::test]
async fn test_empty_device_reads_eof() {
    let device = new_device(32);
    let session = device.open().unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(session.read(&mut buf).await, Ok(0));
    session.close().await;
}

#[tokio::test]
async fn test_oversized_write_truncates() {
    let device = new_device(256);
    let session = device.open().unwrap();

    let big = vec![b'z'; 400];
    assert_eq!(session.write(&big).await.unwrap(), 255);

    let snapshot = device.snapshot().await;
    assert_eq!(snapshot.valid_len, 255);
    assert_eq!(snapshot.capacity, 256);
    assert_eq!(snapshot.payload, vec![b'z'; 255]);

    let data = session.read_vec(1000).await.unwrap();
    assert_eq!(data.len(), 255);
    session.close().await;
}

#[tokio::test]
async fn test_chunked_reads_match_single_read() {
    let device = new_device(64);
    let session = device.open().unwrap();
    session.write(b"0123456789abcdef").await.unwrap();

    let k = 5;
    let mut chunked = session.read_vec(k).await.unwrap();
    chunked.extend(session.read_vec(k).await.unwrap());

    session.seek(0);
    let whole = session.read_vec(2 * k).await.unwrap();

    assert_eq!(chunked, whole);
    assert_eq!(whole, b"0123456789");
    session.close().await;
}

#[tokio::test]
async fn test_read_never_exceeds_request_or_remaining() {
    let device = new_device(64);
    let session = device.open().unwrap();
    session.write(b"abcdef").await.unwrap();

    session.seek(4);
    let mut buf = [0u8; 32];
    assert_eq!(session.read(&mut buf).await, Ok(2));
    assert_eq!(&buf[..2], b"ef");

    session.seek(0);
    let mut buf = [0u8; 3];
    assert_eq!(session.read(&mut buf).await, Ok(3));
    assert_eq!(&buf, b"abc");
    session.close().await;
}

#[tokio::test]
async fn test_write_replaces_payload() {
    let device = new_device(64);
    let session = device.open().unwrap();
    session.write(b"a long first message").await.unwrap();
    session.write(b"short").await.unwrap();

    assert_eq!(session.read_vec(64).await.unwrap(), b"short");
    session.close().await;
}

#[tokio::test]
async fn test_payload_survives_close_and_reopen() {
    let device = new_device(64);
    let session = device.open().unwrap();
    session.write(b"persist").await.unwrap();
    session.close().await;

    let session = device.open().unwrap();
    assert_eq!(session.position(), 0);
    assert_eq!(session.read_vec(64).await.unwrap(), b"persist");
    session.close().await;
}

#[tokio::test]
async fn test_faulty_destination() {
    let device = new_device(64);
    let session = device.open().unwrap();
    session.write(b"data").await.unwrap();

    let result = session.read_to(4, &mut BadAddress).await;
    assert_eq!(result, Err(DeviceError::FaultyDestination));
    assert_eq!(session.position(), 0);

    // The lock was released on the error path
    assert_eq!(session.read_vec(4).await.unwrap(), b"data");
    session.close().await;
}

#[tokio::test]
async fn test_faulty_source_leaves_payload_intact() {
    let device = new_device(64);
    let session = device.open().unwrap();
    session.write(b"original").await.unwrap();

    let mut src = IoSource::new(FailingReader { ok: 3 }, 10);
    let result = session.write_from(&mut src).await;
    assert_eq!(result, Err(DeviceError::FaultySource));

    let snapshot = device.snapshot().await;
    assert_eq!(snapshot.payload, b"original");
    assert_eq!(snapshot.valid_len, 8);
    session.close().await;
}

#[tokio::test]
async fn test_io_adapters() {
    let device = new_device(64);
    let session = device.open().unwrap();

    let mut src = IoSource::new(&b"via reader"[..], 10);
    assert_eq!(session.write_from(&mut src).await, Ok(10));

    let mut sink = IoSink::new(Vec::new());
    assert_eq!(session.read_to(64, &mut sink).await, Ok(10));
    assert_eq!(sink.into_inner(), b"via reader");
    session.close().await;
}

#[tokio::test]
async fn test_embedded_io_traits() {
    let device = new_device(64);
    let mut session = device.open().unwrap();

    Write::write_all(&mut session, b"embedded").await.unwrap();
    Write::flush(&mut session).await.unwrap();

    let mut buf = [0u8; 8];
    Read::read_exact(&mut session, &mut buf).await.unwrap();
    assert_eq!(&buf, b"embedded");
    session.close().await;
}

#[tokio::test]
async fn test_interrupter_after_close_is_ignored() {
    let device = new_device(64);
    let session = device.open().unwrap();
    let interrupter = session.interrupter();
    session.close().await;

    assert!(!interrupter.interrupt());
    let session = device.open().unwrap();
    session.write(b"ok").await.unwrap();
    assert_eq!(session.read_vec(4).await.unwrap(), b"ok");
    session.close().await;
}

#[tokio::test]
async fn test_signal_while_idle_does_not_fail_next_read() {
    let device = new_device(64);
    let session = device.open().unwrap();
    session.write(b"data").await.unwrap();

    assert!(session.interrupter().interrupt());
    assert_eq!(session.read_vec(4).await.unwrap(), b"data");

    session.interrupter().interrupt();
    assert_eq!(session.write(b"next").await, Ok(4));
    session.seek(0);
    assert_eq!(session.read_vec(4).await.unwrap(), b"next");
    session.close().await;
}

#[tokio::test]
async fn test_dropped_session_is_released() {
    let device = new_device(64);
    let session = device.open().unwrap();
    drop(session);

    // The lock was free, so the release already happened
    assert_eq!(device.open_count().await, 0);
    let session = device.open().unwrap();
    session.close().await;
}
