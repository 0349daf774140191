//! End-to-end tests: the bridge against a scripted device.
//!
//! Each test binds a loopback listener, points a [`Bridge`] at it, and
//! plays the device side of the dialect by hand — handshake bytes first,
//! then whatever framebuffer traffic the scenario calls for.  The
//! recording display's probe observes what reached the downstream side,
//! and injects key events the way a connected viewer would.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use aten_bridge::display::headless::{DisplayProbe, HeadlessDisplay};
use aten_bridge::display::DirtyRect;
use aten_bridge::{Bridge, ProxyConfig, SessionError};

const POLL_STEP: Duration = Duration::from_millis(5);
const DEADLINE: Duration = Duration::from_secs(5);

struct Harness {
    probe: DisplayProbe,
    session: JoinHandle<Result<(), SessionError>>,
    peer: TcpStream,
    _pump: JoinHandle<()>,
}

/// Starts a bridge session against a fresh loopback listener and returns
/// the accepted device-side socket.
fn start_session(width: u16, height: u16) -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let config = ProxyConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        username: "testuser".to_string(),
        password: "testpass".to_string(),
        initial_width: width,
        initial_height: height,
        ..ProxyConfig::default()
    };

    let bridge = Arc::new(Bridge::new(config));
    let (display, probe) = HeadlessDisplay::new();
    let pump = bridge.attach_display(Box::new(display));

    let session = {
        let bridge = Arc::clone(&bridge);
        thread::spawn(move || bridge.run_session())
    };

    let (peer, _) = listener.accept().expect("accept");
    peer.set_read_timeout(Some(DEADLINE)).expect("read timeout");

    Harness {
        probe,
        session,
        peer,
        _pump: pump,
    }
}

/// Plays the device's half of the handshake and returns the credentials
/// block the bridge sent.
fn handshake_as_device(peer: &mut TcpStream, name: &str) -> [u8; 48] {
    peer.write_all(b"RFB 003.008\n").expect("send version");
    let mut version = [0u8; 12];
    peer.read_exact(&mut version).expect("client version");
    assert_eq!(&version, b"RFB 003.008\n");

    // One security type on offer: the vendor type 16.
    peer.write_all(&[1, 16]).expect("send security list");
    let mut chosen = [0u8; 1];
    peer.read_exact(&mut chosen).expect("security choice");
    assert_eq!(chosen[0], 16);

    peer.write_all(&[0xAA; 24]).expect("vendor pre-auth block");

    let mut credentials = [0u8; 48];
    peer.read_exact(&mut credentials).expect("credentials");

    peer.write_all(&0u32.to_be_bytes()).expect("auth status");

    let mut client_init = [0u8; 1];
    peer.read_exact(&mut client_init).expect("client init");
    assert_eq!(client_init[0], 0, "bridge must request a shared session");

    peer.write_all(&[0xBB; 20]).expect("server init");
    peer.write_all(&(name.len() as u32).to_be_bytes()).expect("name length");
    peer.write_all(name.as_bytes()).expect("name");
    peer.write_all(&[0xCC; 12]).expect("vendor post-name block");

    credentials
}

/// Reads one 10-byte framebuffer update request off the socket.
fn read_update_request(peer: &mut TcpStream) -> [u8; 10] {
    let mut request = [0u8; 10];
    peer.read_exact(&mut request).expect("update request");
    assert_eq!(request[0], 3, "expected an update request, got type {}", request[0]);
    request
}

/// Builds the 20 wire bytes of one rectangle header.
fn rect_header(x: u16, y: u16, width: u16, height: u16, data_len: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(20);
    bytes.extend_from_slice(&x.to_be_bytes());
    bytes.extend_from_slice(&y.to_be_bytes());
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&0u32.to_be_bytes()); // encoding
    bytes.extend_from_slice(&0u32.to_be_bytes()); // unknown
    bytes.extend_from_slice(&data_len.to_be_bytes());
    bytes
}

/// Wraps per-rectangle payloads into one framebuffer-update message.
fn frame_update_message(rects: &[Vec<u8>]) -> Vec<u8> {
    let mut message = vec![0u8, 0]; // type 0, padding
    message.extend_from_slice(&(rects.len() as u16).to_be_bytes());
    for rect in rects {
        message.extend_from_slice(rect);
    }
    message
}

/// A whole-frame tile payload around the given device pixel bytes.
fn whole_frame_tile(pixel_bytes: &[u8]) -> Vec<u8> {
    let mut tile = vec![1u8, 0]; // type 1, padding
    tile.extend_from_slice(&0u32.to_be_bytes()); // segments, unused here
    tile.extend_from_slice(&(10 + pixel_bytes.len() as u32).to_be_bytes());
    tile.extend_from_slice(pixel_bytes);
    tile
}

/// One subrect segment at tile coordinates `(tile_x, tile_y)`.
fn subrect_segment(tile_x: u8, tile_y: u8, pixel_value: u16) -> Vec<u8> {
    let mut segment = vec![0u8; 4]; // preamble, unused
    segment.push(tile_y);
    segment.push(tile_x);
    for _ in 0..256 {
        segment.extend_from_slice(&pixel_value.to_le_bytes());
    }
    segment
}

/// Repeats a device pixel value into a byte vector.
fn pixels_of(value: u16, count: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 * count);
    for _ in 0..count {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Polls `condition` until it holds or the deadline passes.
fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + DEADLINE;
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        thread::sleep(POLL_STEP);
    }
    panic!("timed out waiting for {what}");
}

/// Ends the session from the device side and checks it wound down the
/// way a dropped connection should.
fn finish(harness: Harness) {
    drop(harness.peer);
    match harness.session.join().expect("session thread") {
        Ok(()) | Err(SessionError::Net(_)) => {}
        Err(other) => panic!("session must end with a transport error, got: {other}"),
    }
}

/// Reads the 16-bit pixel at `(x, y)` out of a snapshot.
fn pixel_at(snapshot: &[u8], fb_width: u16, x: usize, y: usize) -> u16 {
    let offset = 2 * (y * fb_width as usize + x);
    u16::from_le_bytes([snapshot[offset], snapshot[offset + 1]])
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn test_handshake_sends_credentials_and_initial_full_request() {
    let mut harness = start_session(640, 480);

    let credentials = handshake_as_device(&mut harness.peer, "NAME");

    // Two fixed-length NUL-padded fields.
    assert_eq!(&credentials[..8], b"testuser");
    assert!(credentials[8..24].iter().all(|&b| b == 0));
    assert_eq!(&credentials[24..32], b"testpass");
    assert!(credentials[32..].iter().all(|&b| b == 0));

    // The first request after the handshake is a full-frame request with
    // zero coordinates, so its bytes are fixed in any byte order.
    let request = read_update_request(&mut harness.peer);
    assert_eq!(request, [3, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

    let probe = harness.probe.clone();
    wait_for("desktop name to reach the display", || {
        probe.desktop_name().as_deref() == Some("NAME")
    });

    finish(harness);
}

#[test]
fn test_screen_off_sentinel_blanks_and_requests_full_frames() {
    let mut harness = start_session(32, 16);
    handshake_as_device(&mut harness.peer, "kvm");
    read_update_request(&mut harness.peer);

    // A rectangle with the -640 x -480 dimension sentinel and no payload.
    let message = frame_update_message(&[rect_header(0, 0, 0xFD80, 0xFE20, 0)]);
    harness.peer.write_all(&message).expect("send sentinel");

    // With the screen off the next request must be non-incremental.
    let request = read_update_request(&mut harness.peer);
    assert_eq!(request[1], 0, "screen-off must request full frames");

    let probe = harness.probe.clone();
    wait_for("full-frame dirty rect", || {
        probe.dirty_rects().contains(&DirtyRect {
            x1: 0,
            y1: 0,
            x2: 32,
            y2: 16,
        })
    });

    // The dirty rect is queued after the fill, so by now the grey screen
    // is fully in place.
    let framebuffer = harness.probe.framebuffer().expect("framebuffer installed");
    assert!(framebuffer.snapshot().iter().all(|&b| b == 0xF0));

    finish(harness);
}

#[test]
fn test_whole_frame_update_rewrites_the_framebuffer() {
    let mut harness = start_session(16, 8);
    handshake_as_device(&mut harness.peer, "kvm");
    read_update_request(&mut harness.peer);

    // Device-side red pixels across the whole 16x8 frame.
    let payload = pixels_of(0x7C00, 16 * 8);
    let rect: Vec<u8> = [rect_header(0, 0, 16, 8, 10 + payload.len() as u32), whole_frame_tile(&payload)].concat();
    harness
        .peer
        .write_all(&frame_update_message(&[rect]))
        .expect("send frame");

    let request = read_update_request(&mut harness.peer);
    assert_eq!(request[1], 1, "a live screen requests incremental updates");

    let probe = harness.probe.clone();
    wait_for("full-frame dirty rect", || {
        probe.dirty_rects().contains(&DirtyRect {
            x1: 0,
            y1: 0,
            x2: 16,
            y2: 8,
        })
    });

    // Every pixel must arrive channel-swapped: device red becomes blue.
    let snapshot = harness.probe.framebuffer().expect("framebuffer").snapshot();
    for pair in snapshot.chunks_exact(2) {
        assert_eq!(u16::from_le_bytes([pair[0], pair[1]]), 0x001F);
    }

    finish(harness);
}

#[test]
fn test_subrect_tiles_blit_and_merge_into_one_dirty_rect() {
    let mut harness = start_session(64, 64);
    handshake_as_device(&mut harness.peer, "kvm");
    read_update_request(&mut harness.peer);

    // Two 16x16 tiles at tile coordinates (1, 1) and (2, 3).
    let segments = [subrect_segment(1, 1, 0x7C00), subrect_segment(2, 3, 0x001F)].concat();
    let mut tile = vec![0u8, 0]; // type 0, padding
    tile.extend_from_slice(&2u32.to_be_bytes());
    tile.extend_from_slice(&(10 + segments.len() as u32).to_be_bytes());
    tile.extend_from_slice(&segments);

    let rect: Vec<u8> = [rect_header(0, 0, 64, 64, tile.len() as u32), tile].concat();
    harness
        .peer
        .write_all(&frame_update_message(&[rect]))
        .expect("send tiles");
    read_update_request(&mut harness.peer);

    // Both tiles must be covered by a single merged rectangle.
    let probe = harness.probe.clone();
    wait_for("merged dirty rect", || {
        probe.dirty_rects().contains(&DirtyRect {
            x1: 16,
            y1: 16,
            x2: 48,
            y2: 64,
        })
    });

    let snapshot = harness.probe.framebuffer().expect("framebuffer").snapshot();
    // First tile origin (16, 16): device red arrives as blue.
    assert_eq!(pixel_at(&snapshot, 64, 16, 16), 0x001F);
    // Second tile origin (32, 48): device blue arrives as red.
    assert_eq!(pixel_at(&snapshot, 64, 32, 48), 0x7C00);
    // Outside both tiles nothing was written.
    assert_eq!(pixel_at(&snapshot, 64, 0, 0), 0);
    assert_eq!(pixel_at(&snapshot, 64, 63, 63), 0);

    finish(harness);
}

#[test]
fn test_dimension_change_installs_a_new_framebuffer() {
    let mut harness = start_session(640, 480);
    handshake_as_device(&mut harness.peer, "kvm");
    read_update_request(&mut harness.peer);

    // The device reports a 32x16 screen with a whole-frame payload.
    let payload = pixels_of(0x001F, 32 * 16);
    let rect: Vec<u8> = [rect_header(0, 0, 32, 16, 10 + payload.len() as u32), whole_frame_tile(&payload)].concat();
    harness
        .peer
        .write_all(&frame_update_message(&[rect]))
        .expect("send resize frame");
    read_update_request(&mut harness.peer);

    let probe = harness.probe.clone();
    wait_for("resized framebuffer", || {
        probe
            .framebuffer()
            .map(|fb| (fb.width(), fb.height()))
            == Some((32, 16))
    });

    // The initial install plus the resize.
    assert_eq!(harness.probe.framebuffer_installs(), 2);

    // The blit went into the new buffer, channel-swapped.
    let framebuffer = harness.probe.framebuffer().expect("framebuffer");
    let snapshot = framebuffer.snapshot();
    assert_eq!(snapshot.len(), 32 * 16 * 2);
    assert_eq!(pixel_at(&snapshot, 32, 0, 0), 0x7C00);
    assert_eq!(pixel_at(&snapshot, 32, 31, 15), 0x7C00);

    finish(harness);
}

#[test]
fn test_viewer_keys_reach_the_device_and_unmapped_keys_are_dropped() {
    let mut harness = start_session(640, 480);
    handshake_as_device(&mut harness.peer, "kvm");
    read_update_request(&mut harness.peer);

    // 'a' down: HID usage 0x04 as a big-endian u32 at offset 5.
    harness.probe.press_key(true, 0x61);
    let mut packet = [0u8; 17];
    harness.peer.read_exact(&mut packet).expect("key packet");
    let mut expected = [0u8; 17];
    expected[0] = 4;
    expected[2] = 1;
    expected[8] = 0x04;
    assert_eq!(packet, expected);

    // An unmapped keysym produces no bytes; the next thing on the wire
    // is the release of 'a'.
    harness.probe.press_key(true, 0xDEAD);
    harness.probe.press_key(false, 0x61);
    let mut release = [0u8; 17];
    harness.peer.read_exact(&mut release).expect("release packet");
    expected[2] = 0;
    assert_eq!(release, expected, "unmapped key must be dropped");

    finish(harness);
}

#[test]
fn test_unknown_message_type_ends_the_session_fatally() {
    let mut harness = start_session(640, 480);
    handshake_as_device(&mut harness.peer, "kvm");
    read_update_request(&mut harness.peer);

    harness.peer.write_all(&[0x42]).expect("send junk type");

    let result = harness.session.join().expect("session thread");
    match result {
        Err(error @ SessionError::Protocol(_)) => {
            assert!(error.is_fatal(), "protocol errors must not be retried")
        }
        other => panic!("expected a protocol error, got: {other:?}"),
    }
}

#[test]
fn test_recognized_status_messages_are_discarded_without_desync() {
    let mut harness = start_session(32, 16);
    handshake_as_device(&mut harness.peer, "kvm");
    read_update_request(&mut harness.peer);

    // A key-status reply (type 4, 20 bytes) and two vendor status
    // messages, followed by a real sentinel update.  If the discard
    // lengths drifted, the sentinel would be misparsed and the session
    // would die instead of answering with a full-frame request.
    let mut traffic = Vec::new();
    traffic.push(0x04);
    traffic.extend_from_slice(&[0u8; 20]);
    traffic.push(0x16);
    traffic.push(0);
    traffic.push(0x39);
    traffic.extend_from_slice(&[0u8; 264]);
    traffic.extend_from_slice(&frame_update_message(&[rect_header(0, 0, 0xFD80, 0xFE20, 0)]));
    harness.peer.write_all(&traffic).expect("send status traffic");

    let request = read_update_request(&mut harness.peer);
    assert_eq!(request[1], 0);

    finish(harness);
}
