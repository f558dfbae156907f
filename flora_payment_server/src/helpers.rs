use std::{net::IpAddr, str::FromStr, sync::OnceLock};

use actix_web::HttpRequest;
use log::trace;
use regex::Regex;

/// The client address recorded against provider callbacks. Sources, in decreasing order of
/// preference:
/// 1. The first hop of the `X-Forwarded-For` header, iif `use_x_forwarded_for` is set in the
///    configuration.
/// 2. The `for=` directive of the `Forwarded` header, iif `use_forwarded` is set.
/// 3. The peer address of the connection.
///
/// The header sources only make sense behind a proxy that overwrites them; trusting them on a
/// directly-exposed server lets callers spoof their address, which is why both default to off.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut ip = None;
    if use_x_forwarded_for {
        ip = x_forwarded_for(req);
    }
    if ip.is_none() && use_forwarded {
        ip = forwarded(req);
    }
    ip.or_else(|| peer_address(req))
}

fn x_forwarded_for(req: &HttpRequest) -> Option<IpAddr> {
    let header = req.headers().get("X-Forwarded-For")?.to_str().ok()?;
    // Each proxy appends to the chain, so the first entry is the originating client.
    let first_hop = header.split(',').next()?.trim();
    IpAddr::from_str(first_hop).ok()
}

fn forwarded(req: &HttpRequest) -> Option<IpAddr> {
    static FOR_DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    let re = FOR_DIRECTIVE.get_or_init(|| Regex::new(r"for=(?P<ip>[^;,\s]+)").expect("valid literal regex"));
    let header = req.headers().get("Forwarded")?.to_str().ok()?;
    let ip = re.captures(header)?.name("ip")?.as_str().trim_matches('"');
    IpAddr::from_str(ip).ok()
}

fn peer_address(req: &HttpRequest) -> Option<IpAddr> {
    let peer = req.connection_info().peer_addr().map(ToString::to_string);
    trace!("Using peer address for remote address: {peer:?}");
    peer.and_then(|s| IpAddr::from_str(&s).ok())
}
