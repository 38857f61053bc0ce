/*
Copyright (c) 2021 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/


//! Conversion between the textual values callers supply and the big-endian byte strings
//! P4Runtime carries.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use itertools::Itertools;

use lazy_static::lazy_static;

use regex::Regex;

use tracing::warn;

lazy_static! {
    static ref IPV4: Regex =
        Regex::new(r"^((25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)$")
            .unwrap();
    static ref MAC: Regex = Regex::new(r"^[0-9a-fA-F]{2}(:[0-9a-fA-F]{2}){5}$").unwrap();
}

pub fn is_ipv4(s: &str) -> bool {
    IPV4.is_match(s)
}

pub fn is_mac(s: &str) -> bool {
    MAC.is_match(s)
}

/// Parses hex digits, with or without a `0x` prefix, into bytes.  An odd number of digits is
/// padded with a leading zero.
pub fn parse_hex(s: &str) -> Option<Vec<u8>> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    (0..padded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&padded[i..i + 2], 16).ok())
        .collect()
}

fn parse_separated(s: &str, sep: char, radix: u32) -> Option<Vec<u8>> {
    s.split(sep).map(|part| u8::from_str_radix(part, radix).ok()).collect()
}

/// Parses a dotted-quad IPv4 address, a colon-separated MAC address, `0x` hex, or an unsigned
/// decimal integer, without fitting it to any width.
pub fn parse_value(value: &str) -> Option<Vec<u8>> {
    let value = value.trim();
    if is_ipv4(value) {
        parse_separated(value, '.', 10)
    } else if is_mac(value) {
        parse_separated(value, ':', 16)
    } else if value.starts_with("0x") || value.starts_with("0X") {
        parse_hex(value)
    } else {
        let n = value.parse::<u128>().ok()?;
        let mut bytes = Vec::with_capacity(16);
        bytes.write_u128::<BigEndian>(n).ok()?;
        Some(bytes)
    }
}

/// Left-pads `bytes` with zeros, or drops its most significant bytes, to make it exactly `width`
/// bytes long.
pub fn fit(bytes: &[u8], width: usize) -> Vec<u8> {
    if bytes.len() >= width {
        bytes[bytes.len() - width..].to_vec()
    } else {
        let mut fitted = vec![0; width - bytes.len()];
        fitted.extend_from_slice(bytes);
        fitted
    }
}

/// Converts `value` to `width` big-endian bytes.  A value that cannot be parsed becomes all
/// zeros.
pub fn value_to_bytes(value: &str, width: usize) -> Vec<u8> {
    match parse_value(value) {
        Some(bytes) => fit(&bytes, width),
        None => {
            warn!("could not parse value {:?}, encoding as zero", value);
            vec![0; width]
        }
    }
}

/// Four octets for a dotted-quad address, empty for anything else.
pub fn ipv4_to_bytes(value: &str) -> Vec<u8> {
    if is_ipv4(value) {
        parse_separated(value, '.', 10).unwrap_or_default()
    } else {
        Vec::new()
    }
}

pub fn u32_to_bytes(value: u32) -> Vec<u8> {
    let mut bytes = vec![0; 4];
    BigEndian::write_u32(&mut bytes, value);
    bytes
}

/// A 4-byte mask with the top `prefix_len` bits set.  Lengths past 32 give an all-ones mask.
fn prefix_mask(prefix_len: u32) -> Vec<u8> {
    let bits = match prefix_len {
        0 => 0,
        1..=32 => u32::MAX << (32 - prefix_len),
        _ => u32::MAX,
    };
    u32_to_bytes(bits)
}

/// A ternary mask given either as a dotted quad or as a prefix length in `1..=32`.  Anything else
/// gives an empty mask.
pub fn ternary_mask(mask: &str) -> Vec<u8> {
    let mask = mask.trim();
    if is_ipv4(mask) {
        return ipv4_to_bytes(mask);
    }
    match mask.parse::<u32>() {
        Ok(n) if (1..=32).contains(&n) => prefix_mask(n),
        _ => {
            warn!("invalid ternary mask {:?}", mask);
            Vec::new()
        }
    }
}

/// Renders wire bytes for display: six bytes as a MAC address, up to sixteen as an unsigned
/// decimal, and anything longer as hex.  An empty value renders as nothing.
pub fn bytes_to_string(bytes: &[u8]) -> String {
    match bytes.len() {
        0 => String::new(),
        6 => bytes.iter().map(|b| format!("{:02x}", b)).join(":"),
        1..=16 => bytes
            .iter()
            .fold(0u128, |n, &b| (n << 8) | u128::from(b))
            .to_string(),
        _ => format!("0x{}", hex(bytes)),
    }
}

/// Renders an LPM or ternary value or mask, which are IPv4 addresses on the wire.
pub fn address_to_string(bytes: &[u8]) -> String {
    match bytes.len() {
        4 => bytes.iter().join("."),
        _ => bytes_to_string(bytes),
    }
}

/// Renders a range bound, a 4-byte big-endian integer on the wire.
pub fn bound_to_string(bytes: &[u8]) -> String {
    match bytes.len() {
        4 => BigEndian::read_u32(bytes).to_string(),
        _ => bytes_to_string(bytes),
    }
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).join("")
}
