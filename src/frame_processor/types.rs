// SPDX-License-Identifier: MPL-2.0

//! Core types for frame analysis results
//!
//! Decoded barcode content is parsed into a [`BarcodePayload`]. Only network
//! credentials and hyperlinks are classified into callback strings; every
//! other kind is recognized but kept internal.

use std::fmt;

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            x: x as f32 / frame_width as f32,
            y: y as f32 / frame_height as f32,
            width: width as f32 / frame_width as f32,
            height: height as f32 / frame_height as f32,
        }
    }
}

/// WiFi security type parsed from a network credential payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiSecurity {
    /// No security (open network)
    None,
    /// WEP security (legacy, insecure)
    Wep,
    /// WPA/WPA2 Personal
    Wpa,
    /// WPA2 Enterprise
    Wpa2Enterprise,
    /// WPA3
    Wpa3,
}

impl WifiSecurity {
    /// Parse the `T:` field of a WIFI payload
    pub fn from_code(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "WEP" => Self::Wep,
            "WPA" | "WPA2" => Self::Wpa,
            "WPA2-EAP" | "WPA3-EAP" => Self::Wpa2Enterprise,
            "WPA3" | "SAE" => Self::Wpa3,
            "NOPASS" | "" => Self::None,
            _ => Self::Wpa, // Default to WPA for unknown
        }
    }

    /// Encryption scheme name
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::None => "Open",
            Self::Wep => "WEP",
            Self::Wpa => "WPA",
            Self::Wpa2Enterprise => "WPA2-EAP",
            Self::Wpa3 => "WPA3",
        }
    }
}

impl fmt::Display for WifiSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Coarse payload kind, used for logging and outcome tagging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarcodeKind {
    WifiCredentials,
    Url,
    Text,
    Phone,
    Email,
    Sms,
    Location,
    Contact,
    Event,
}

impl fmt::Display for BarcodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarcodeKind::WifiCredentials => "wifi",
            BarcodeKind::Url => "url",
            BarcodeKind::Text => "text",
            BarcodeKind::Phone => "phone",
            BarcodeKind::Email => "email",
            BarcodeKind::Sms => "sms",
            BarcodeKind::Location => "location",
            BarcodeKind::Contact => "contact",
            BarcodeKind::Event => "event",
        };
        f.write_str(name)
    }
}

/// Structured content of a decoded barcode
#[derive(Debug, Clone, PartialEq)]
pub enum BarcodePayload {
    /// Hyperlink, optionally titled (bookmark formats carry a title)
    Url { url: String, title: Option<String> },

    /// WiFi network credentials
    Wifi {
        /// Network name (SSID)
        ssid: String,
        /// Network password (None for open networks)
        password: Option<String>,
        /// Security type
        security: WifiSecurity,
        /// Hidden network flag
        hidden: bool,
    },

    /// Plain text
    Text(String),

    /// Phone number (tel: URI)
    Phone(String),

    /// Email address (mailto: URI)
    Email {
        address: String,
        subject: Option<String>,
        body: Option<String>,
    },

    /// SMS message (sms: or smsto: URI)
    Sms {
        number: String,
        message: Option<String>,
    },

    /// Geographic location (geo: URI)
    Location {
        latitude: f64,
        longitude: f64,
        label: Option<String>,
    },

    /// vCard contact information
    Contact(String),

    /// Calendar event (VCALENDAR)
    Event(String),
}

impl BarcodePayload {
    /// Parse decoded barcode content
    ///
    /// Falls back to `Text` for unrecognized formats.
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();

        // WIFI:T:<security>;S:<ssid>;P:<password>;H:<hidden>;;
        if let Some(rest) = trimmed.strip_prefix("WIFI:") {
            return Self::parse_wifi(rest);
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Self::Url {
                url: trimmed.to_string(),
                title: None,
            };
        }

        // MEBKM:TITLE:<title>;URL:<url>;;
        if let Some(rest) = trimmed.strip_prefix("MEBKM:")
            && let Some(bookmark) = Self::parse_bookmark(rest)
        {
            return bookmark;
        }

        // URLTO:<title>:<url>
        if let Some(rest) = trimmed.strip_prefix("URLTO:")
            && let Some((title, url)) = rest.split_once(':')
            && !url.is_empty()
        {
            return Self::Url {
                url: with_scheme(url),
                title: (!title.is_empty()).then(|| title.to_string()),
            };
        }

        if let Some(number) = trimmed.strip_prefix("tel:") {
            return Self::Phone(number.to_string());
        }

        if let Some(rest) = trimmed.strip_prefix("mailto:") {
            return Self::parse_mailto(rest);
        }

        if let Some(rest) = trimmed
            .strip_prefix("sms:")
            .or_else(|| trimmed.strip_prefix("smsto:"))
        {
            return Self::parse_sms(rest);
        }

        if let Some(rest) = trimmed.strip_prefix("geo:")
            && let Some(loc) = Self::parse_geo(rest)
        {
            return loc;
        }

        if trimmed.starts_with("BEGIN:VCARD") {
            return Self::Contact(trimmed.to_string());
        }

        if trimmed.starts_with("BEGIN:VCALENDAR") || trimmed.starts_with("BEGIN:VEVENT") {
            return Self::Event(trimmed.to_string());
        }

        // Bare host names
        if trimmed.starts_with("www.")
            && trimmed.contains('.')
            && !trimmed.contains(char::is_whitespace)
            && trimmed.len() < 256
        {
            return Self::Url {
                url: format!("https://{}", trimmed),
                title: None,
            };
        }

        Self::Text(trimmed.to_string())
    }

    /// Coarse kind of this payload
    pub fn kind(&self) -> BarcodeKind {
        match self {
            Self::Url { .. } => BarcodeKind::Url,
            Self::Wifi { .. } => BarcodeKind::WifiCredentials,
            Self::Text(_) => BarcodeKind::Text,
            Self::Phone(_) => BarcodeKind::Phone,
            Self::Email { .. } => BarcodeKind::Email,
            Self::Sms { .. } => BarcodeKind::Sms,
            Self::Location { .. } => BarcodeKind::Location,
            Self::Contact(_) => BarcodeKind::Contact,
            Self::Event(_) => BarcodeKind::Event,
        }
    }

    /// String delivered to the barcode-success callback
    ///
    /// Network credentials become one formatted block; hyperlinks become the
    /// bare URL. Every other kind yields `None` and produces no callback.
    pub fn classify(&self) -> Option<String> {
        match self {
            Self::Wifi {
                ssid,
                password,
                security,
                ..
            } => Some(format!(
                "SSID: {}\nPassword: {}\nEncryption: {}",
                ssid,
                password.as_deref().unwrap_or(""),
                security.scheme()
            )),
            Self::Url { url, .. } => Some(url.clone()),
            _ => None,
        }
    }

    fn parse_wifi(content: &str) -> Self {
        let mut ssid = String::new();
        let mut password = None;
        let mut security = WifiSecurity::None;
        let mut hidden = false;

        for (key, value) in escaped_fields(content) {
            match key.as_str() {
                "S" => ssid = value,
                "P" => password = Some(value),
                "T" => security = WifiSecurity::from_code(&value),
                "H" => hidden = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if security == WifiSecurity::None && password.as_deref().is_some_and(|p| !p.is_empty()) {
            // Password without a type is almost always WPA
            security = WifiSecurity::Wpa;
        }

        Self::Wifi {
            ssid,
            password: password.filter(|p| !p.is_empty()),
            security,
            hidden,
        }
    }

    fn parse_bookmark(content: &str) -> Option<Self> {
        let mut url = None;
        let mut title = None;
        for (key, value) in escaped_fields(content) {
            match key.as_str() {
                "URL" => url = Some(value),
                "TITLE" => title = Some(value),
                _ => {}
            }
        }
        let url = url.filter(|u| !u.is_empty())?;
        Some(Self::Url {
            url: with_scheme(&url),
            title: title.filter(|t| !t.is_empty()),
        })
    }

    fn parse_mailto(content: &str) -> Self {
        let (address, params) = content.split_once('?').unwrap_or((content, ""));

        let mut subject = None;
        let mut body = None;

        for (key, value) in query_params(params) {
            match key.to_lowercase().as_str() {
                "subject" => subject = Some(value),
                "body" => body = Some(value),
                _ => {}
            }
        }

        Self::Email {
            address: urlencoding_decode(address),
            subject,
            body,
        }
    }

    fn parse_sms(content: &str) -> Self {
        // smsto:<number>:<message> or sms:<number>?body=<message>
        if let Some((number, message)) = content.split_once(':') {
            return Self::Sms {
                number: number.to_string(),
                message: (!message.is_empty()).then(|| message.to_string()),
            };
        }

        let (number, params) = content.split_once('?').unwrap_or((content, ""));
        let message = query_params(params)
            .find(|(key, _)| key.eq_ignore_ascii_case("body"))
            .map(|(_, value)| value);

        Self::Sms {
            number: number.to_string(),
            message,
        }
    }

    fn parse_geo(content: &str) -> Option<Self> {
        let (coords, params) = content.split_once('?').unwrap_or((content, ""));

        let mut parts = coords.split(',');
        let latitude = parts.next()?.trim().parse::<f64>().ok()?;
        let longitude = parts.next()?.trim().parse::<f64>().ok()?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }

        let label = query_params(params)
            .find(|(key, _)| key == "q" || key == "label")
            .map(|(_, value)| value);

        Some(Self::Location {
            latitude,
            longitude,
            label,
        })
    }
}

/// Prefix `http://` when a bookmark URL has no scheme
fn with_scheme(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Split `K:value;K:value;;` fields honoring backslash escapes
///
/// The key ends at the first unescaped `:`, the field at the next unescaped
/// `;`. Escaped characters are taken literally.
fn escaped_fields(content: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut chars = content.chars();

    while let Some(c) = chars.next() {
        let target = if in_value { &mut value } else { &mut key };
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    target.push(escaped);
                }
            }
            ':' if !in_value => in_value = true,
            ';' => {
                if in_value {
                    fields.push((std::mem::take(&mut key), std::mem::take(&mut value)));
                }
                key.clear();
                in_value = false;
            }
            _ => target.push(c),
        }
    }
    if in_value {
        fields.push((key, value));
    }

    fields
}

/// Iterate decoded `key=value` pairs of a query string
fn query_params(params: &str) -> impl Iterator<Item = (String, String)> + '_ {
    params
        .split('&')
        .filter_map(|param| param.split_once('='))
        .map(|(key, value)| (key.to_string(), urlencoding_decode(value)))
}

/// Percent and `+` decoding for query parameters
fn urlencoding_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// A decoded barcode with its location and parsed content
#[derive(Debug, Clone, PartialEq)]
pub struct BarcodeDetection {
    /// Bounding box in normalized frame coordinates
    pub bounds: FrameRegion,
    /// Raw decoded content
    pub content: String,
    /// Parsed payload
    pub payload: BarcodePayload,
}

impl BarcodeDetection {
    pub fn new(bounds: FrameRegion, content: String) -> Self {
        let payload = BarcodePayload::parse(&content);
        Self {
            bounds,
            content,
            payload,
        }
    }
}
