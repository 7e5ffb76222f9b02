//! postfx-control-osc
//!
//! Debug/configuration collaborator over OSC. Receives `(name, f32)` updates over UDP and
//! writes them into a `PostFxConfig` between frames through `PostFxConfig::set_param`.
//!
//! rosc 0.10.x API note:
//! - `rosc::decoder::decode_udp` returns `Result<(&[u8], OscPacket), _>` (nom-style),
//!   where the first tuple element is the *unconsumed remainder* of the buffer.
#![forbid(unsafe_code)]

use std::io;
use std::net::{SocketAddr, UdpSocket};

use rosc::{OscPacket, OscType};
use thiserror::Error;

use postfx_core::{EngineError, PostFxConfig};

#[derive(Debug, Error)]
pub enum OscError {
    #[error("failed to bind OSC socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("socket error: {0}")]
    Socket(#[from] io::Error),
}

/// Non-blocking UDP OSC receiver that extracts parameter messages.
///
/// Convention:
/// - Address: "/param/<dotted.name>" or "/<dotted.name>"
/// - Value: first argument, coercible to f32 (Float, Double, Int, Long, Bool)
#[derive(Debug)]
pub struct OscParamReceiver {
    sock: UdpSocket,
    buf: [u8; 2048],
}

impl OscParamReceiver {
    /// Bind to an address like "127.0.0.1:9000" and put the socket in non-blocking mode.
    pub fn bind(addr: &str) -> Result<Self, OscError> {
        let bind_err = |source| OscError::Bind {
            addr: addr.to_string(),
            source,
        };
        let sock = UdpSocket::bind(addr).map_err(bind_err)?;
        sock.set_nonblocking(true).map_err(bind_err)?;
        tracing::info!(addr, "osc parameter receiver listening");
        Ok(Self {
            sock,
            buf: [0u8; 2048],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, OscError> {
        Ok(self.sock.local_addr()?)
    }

    /// Drain every packet available right now. Never blocks.
    pub fn poll(&mut self) -> Vec<(String, f32)> {
        let mut out: Vec<(String, f32)> = Vec::new();

        loop {
            match self.sock.recv_from(&mut self.buf) {
                Ok((n, from)) => match rosc::decoder::decode_udp(&self.buf[..n]) {
                    Ok((_rest, pkt)) => extract_from_packet(pkt, &mut out),
                    Err(e) => tracing::debug!(%from, error = ?e, "undecodable osc packet"),
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "osc receive failed");
                    break;
                }
            }
        }

        out
    }
}

/// Walk a packet/bundle tree and push parsed param messages into `out`.
fn extract_from_packet(pkt: OscPacket, out: &mut Vec<(String, f32)>) {
    match pkt {
        OscPacket::Message(m) => match parse_param_message(&m.addr, &m.args) {
            Some(kv) => out.push(kv),
            None => tracing::trace!(addr = %m.addr, "ignored osc message"),
        },
        OscPacket::Bundle(b) => {
            for p in b.content {
                extract_from_packet(p, out);
            }
        }
    }
}

/// Parse a message into a `(name, value)` pair if it matches the address convention.
pub fn parse_param_message(addr: &str, args: &[OscType]) -> Option<(String, f32)> {
    let name = addr
        .strip_prefix("/param/")
        .or_else(|| addr.strip_prefix('/'))?;
    if name.is_empty() {
        return None;
    }
    let v = match *args.first()? {
        OscType::Float(x) => x,
        OscType::Double(x) => x as f32,
        OscType::Int(x) => x as f32,
        OscType::Long(x) => x as f32,
        OscType::Bool(b) => {
            if b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    Some((name.to_string(), v))
}

/// Apply updates in order, skipping unknown names. Returns how many were applied.
pub fn apply_updates(
    cfg: &mut PostFxConfig,
    updates: impl IntoIterator<Item = (String, f32)>,
) -> usize {
    let mut applied = 0;
    for (name, value) in updates {
        match cfg.set_param(&name, value) {
            Ok(()) => applied += 1,
            Err(EngineError::UnknownParam(_)) => {
                tracing::warn!(param = %name, value, "unknown parameter ignored");
            }
            Err(e) => tracing::warn!(param = %name, error = %e, "parameter update rejected"),
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rosc::{OscBundle, OscMessage, OscTime};

    #[test]
    fn both_address_forms_are_accepted() {
        let a = parse_param_message("/param/bloom.threshold", &[OscType::Float(2.0)]);
        let b = parse_param_message("/bloom.threshold", &[OscType::Int(2)]);
        assert_eq!(a, Some(("bloom.threshold".to_string(), 2.0)));
        assert_eq!(a, b);
    }

    #[test]
    fn non_numeric_or_missing_arguments_are_ignored() {
        assert!(parse_param_message("/param/x", &[]).is_none());
        assert!(parse_param_message("/param/x", &[OscType::String("1".into())]).is_none());
        assert!(parse_param_message("/", &[OscType::Float(1.0)]).is_none());
        assert!(parse_param_message("noslash", &[OscType::Float(1.0)]).is_none());
    }

    #[test]
    fn bundles_are_flattened_in_order() {
        let msg = |addr: &str, v: f32| {
            OscPacket::Message(OscMessage {
                addr: addr.to_string(),
                args: vec![OscType::Float(v)],
            })
        };
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![msg("/param/a", 1.0), msg("/b", 2.0)],
        });
        let mut out = Vec::new();
        extract_from_packet(bundle, &mut out);
        assert_eq!(out, vec![("a".to_string(), 1.0), ("b".to_string(), 2.0)]);
    }

    #[test]
    fn apply_skips_unknown_names() {
        let mut cfg = PostFxConfig::default();
        let applied = apply_updates(
            &mut cfg,
            vec![
                ("tonemap.exposure".to_string(), 1.5),
                ("bogus.param".to_string(), 3.0),
                ("fxaa.enabled".to_string(), 0.0),
            ],
        );
        assert_eq!(applied, 2);
        assert_relative_eq!(cfg.tonemap.exposure, 1.5);
        assert!(!cfg.fxaa.enabled);
    }

    #[test]
    fn receiver_round_trips_over_loopback() {
        let mut rx = OscParamReceiver::bind("127.0.0.1:0").unwrap();
        let addr = rx.local_addr().unwrap();
        let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
        let packet = rosc::encoder::encode(&OscPacket::Message(OscMessage {
            addr: "/param/vignette.intensity".to_string(),
            args: vec![OscType::Float(0.75)],
        }))
        .unwrap();
        tx.send_to(&packet, addr).unwrap();

        let mut got = Vec::new();
        for _ in 0..200 {
            got.extend(rx.poll());
            if !got.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(got, vec![("vignette.intensity".to_string(), 0.75)]);
    }

    #[test]
    fn poll_without_traffic_returns_nothing() {
        let mut rx = OscParamReceiver::bind("127.0.0.1:0").unwrap();
        assert!(rx.poll().is_empty());
    }
}
