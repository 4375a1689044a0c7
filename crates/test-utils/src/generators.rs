//! Synthetic GRIB message generators.
//!
//! The builders produce small but structurally valid GRIB1 and GRIB2
//! messages with simple packed data (or PNG packed, GRIB2 template 5.41), so
//! tests never depend on downloaded model output.

use std::io::Write;

/// Encode a signed value in GRIB sign-magnitude form over `N` bytes.
pub fn sign_magnitude<const N: usize>(value: i64) -> [u8; N] {
    let magnitude = value.unsigned_abs();
    let mut bytes = [0u8; N];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = (magnitude >> (8 * (N - 1 - i))) as u8;
    }
    if value < 0 {
        bytes[0] |= 0x80;
    }
    bytes
}

/// Encode a value as an IBM System/360 single precision float, rounding
/// toward negative infinity so the result never exceeds `value`.
pub fn ibm_float(value: f64) -> [u8; 4] {
    if value == 0.0 {
        return [0; 4];
    }
    let negative = value < 0.0;
    let mut fraction = value.abs();
    let mut exponent: i32 = 64;
    while fraction >= 1.0 {
        fraction /= 16.0;
        exponent += 1;
    }
    while fraction < 1.0 / 16.0 {
        fraction *= 16.0;
        exponent -= 1;
    }

    let scaled = fraction * 16_777_216.0;
    let mut mantissa = if negative { scaled.ceil() } else { scaled.floor() } as u32;
    if mantissa >= 1 << 24 {
        mantissa >>= 4;
        exponent += 1;
    }

    let sign = if negative { 0x80 } else { 0 };
    [
        sign | exponent as u8,
        (mantissa >> 16) as u8,
        (mantissa >> 8) as u8,
        mantissa as u8,
    ]
}

fn ibm_value(bytes: [u8; 4]) -> f64 {
    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = (bytes[0] & 0x7f) as i32;
    let mantissa = ((bytes[1] as u32) << 16 | (bytes[2] as u32) << 8 | bytes[3] as u32) as f64;
    sign * mantissa * 16.0_f64.powi(exponent - 64) / 16_777_216.0
}

/// Simple packing of `values` at 16 bits, relative to `reference`.
/// Returns the binary scale factor and the packed octets.
fn pack_values(values: &[f64], reference: f64) -> (i32, Vec<u8>) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - reference;
    if values.is_empty() || range <= 0.0 {
        return (0, Vec::new());
    }

    // value = reference + packed * 2^E, packed fits in 16 bits
    let binary_scale_factor = (range / 65535.0).log2().ceil() as i32;
    let binary_scale = 2.0_f64.powi(binary_scale_factor);

    let mut packed = Vec::with_capacity(values.len() * 2);
    for &val in values {
        let packed_value = ((val - reference) / binary_scale).round().clamp(0.0, 65535.0) as u16;
        packed.extend_from_slice(&packed_value.to_be_bytes());
    }
    (binary_scale_factor, packed)
}

/// 16-bit greyscale PNG holding `packed` (big-endian samples) in one row.
fn png_octets(packed: &[u8]) -> Vec<u8> {
    let width = packed.len() / 2;
    let mut png = Vec::new();
    png.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);

    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.push(16); // bit depth
    ihdr.push(0); // greyscale
    ihdr.extend_from_slice(&[0, 0, 0]);
    write_chunk(&mut png, b"IHDR", &ihdr);

    let mut scanline = Vec::with_capacity(packed.len() + 1);
    scanline.push(0); // filter type: none
    scanline.extend_from_slice(packed);
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&scanline).expect("Failed to deflate PNG data");
    let idat = encoder.finish().expect("Failed to deflate PNG data");
    write_chunk(&mut png, b"IDAT", &idat);

    write_chunk(&mut png, b"IEND", &[]);
    png
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);
    let crc = crc32fast::hash(&[chunk_type.as_slice(), data].concat());
    png.extend_from_slice(&crc.to_be_bytes());
}

fn bitmap_octets(mask: &[bool]) -> Vec<u8> {
    let mut octets = vec![0u8; mask.len().div_ceil(8)];
    for (i, &present) in mask.iter().enumerate() {
        if present {
            octets[i / 8] |= 0x80 >> (i % 8);
        }
    }
    octets
}

fn present_values(values: &[f64], mask: Option<&[bool]>) -> Vec<f64> {
    match mask {
        Some(mask) => values
            .iter()
            .zip(mask)
            .filter(|(_, &present)| present)
            .map(|(&v, _)| v)
            .collect(),
        None => values.to_vec(),
    }
}

/// Build a GRIB2 message with the specified parameters.
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    centre: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    // Grid definition
    ni: u32,
    nj: u32,
    la1: i64,
    lo1: i64,
    la2: i64,
    lo2: i64,
    di: u32,
    dj: u32,
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_scale_factor: i8,
    level_value: u32,
    second_level: Option<u32>,
    forecast_hour: u32,
    ensemble: Option<(u8, u8, u8)>,
    statistics: Option<(u8, u32)>,
    pv: Vec<f32>,
    declared_points: Option<u32>,
    // Data representation
    packing_template: u16,
    data_values: Vec<f64>,
    bitmap: Option<Vec<bool>>,
}

impl Grib2Builder {
    /// GFS-like 2 m temperature on a small 4x3 grid.
    pub fn new_gfs() -> Self {
        let ni = 4;
        let nj = 3;
        Self {
            discipline: 0,
            centre: 7, // NCEP
            year: 2024,
            month: 6,
            day: 1,
            hour: 0,
            ni,
            nj,
            la1: 45_000_000,
            lo1: -130_000_000,
            la2: 43_000_000,
            lo2: -127_000_000,
            di: 1_000_000,
            dj: 1_000_000,
            scanning_mode: 0,
            param_category: 0,
            param_number: 0, // TMP
            level_type: 103, // m above ground
            level_scale_factor: 0,
            level_value: 2,
            second_level: None,
            forecast_hour: 0,
            ensemble: None,
            statistics: None,
            pv: Vec::new(),
            declared_points: None,
            packing_template: 0,
            data_values: vec![288.15; (ni * nj) as usize],
            bitmap: None,
        }
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_centre(mut self, centre: u16) -> Self {
        self.centre = centre;
        self
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    pub fn with_grid(mut self, ni: u32, nj: u32) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.data_values = vec![0.0; (ni * nj) as usize];
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self.second_level = None;
        self
    }

    /// Decimal scale factor of the first fixed surface (sign-magnitude coded)
    pub fn with_level_scale(mut self, scale_factor: i8) -> Self {
        self.level_scale_factor = scale_factor;
        self
    }

    /// Layer between two surfaces of the same type.
    pub fn with_layer(mut self, level_type: u8, top: u32, bottom: u32) -> Self {
        self.level_type = level_type;
        self.level_value = top;
        self.second_level = Some(bottom);
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self
    }

    /// Switch to template 4.1 with the given ensemble description.
    pub fn with_ensemble(mut self, ensemble_type: u8, perturbation: u8, members: u8) -> Self {
        self.ensemble = Some((ensemble_type, perturbation, members));
        self.statistics = None;
        self
    }

    /// Switch to template 4.8 with one statistical process over `hours`.
    pub fn with_statistics(mut self, process: u8, hours: u32) -> Self {
        self.statistics = Some((process, hours));
        self.ensemble = None;
        self
    }

    pub fn with_pv(mut self, pv: Vec<f32>) -> Self {
        self.pv = pv;
        self
    }

    /// Data representation template. 0 and 41 (PNG) carry packed data, any
    /// other template is written as a constant field without data.
    pub fn with_packing_template(mut self, template: u16) -> Self {
        self.packing_template = template;
        self
    }

    /// Number of data points written in Section 3 regardless of the grid.
    pub fn with_declared_points(mut self, points: u32) -> Self {
        self.declared_points = Some(points);
        self
    }

    pub fn with_constant_value(mut self, value: f64) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    pub fn with_gradient(mut self, min_val: f64, max_val: f64) -> Self {
        let n = (self.ni * self.nj) as usize;
        self.data_values = (0..n)
            .map(|i| min_val + (max_val - min_val) * (i as f64 / n as f64))
            .collect();
        self
    }

    pub fn with_data(mut self, data: Vec<f64>) -> Self {
        self.data_values = data;
        self
    }

    /// Bitmap over the grid points; `false` marks a missing point.
    pub fn with_bitmap(mut self, mask: Vec<bool>) -> Self {
        self.bitmap = Some(mask);
        self
    }

    fn product_template(&self) -> u16 {
        match (self.ensemble, self.statistics) {
            (Some(_), _) => 1,
            (None, Some(_)) => 8,
            (None, None) => 0,
        }
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        Self::build_multi_field(std::slice::from_ref(self))
    }

    /// One message holding every builder as a field. Sections 1 and 3 come
    /// from the first builder; each builder contributes sections 4 to 7.
    pub fn build_multi_field(fields: &[Grib2Builder]) -> Vec<u8> {
        let Some(first) = fields.first() else {
            return Vec::new();
        };

        let mut body = Vec::new();
        body.extend_from_slice(&first.build_section1());
        body.extend_from_slice(&first.build_section3());
        for field in fields {
            body.extend_from_slice(&field.build_section4());
            let (section5, section7) = field.build_sections_5_and_7();
            body.extend_from_slice(&section5);
            body.extend_from_slice(&field.build_section6());
            body.extend_from_slice(&section7);
        }

        let message_length = 16 + body.len() + 4;

        let mut message = Vec::with_capacity(message_length);
        // Section 0: Indicator
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(first.discipline);
        message.push(2);
        message.extend_from_slice(&(message_length as u64).to_be_bytes());
        message.extend_from_slice(&body);
        // Section 8: End
        message.extend_from_slice(b"7777");
        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);

        section.extend_from_slice(&self.centre.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-centre
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Significance of reference time (start of forecast)

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0); // Minute
        section.push(0); // Second

        section.push(0); // Production status (operational)
        section.push(1); // Type of data (forecast)
        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();
        // Template 3.0: Latitude/Longitude, 58 octets of template data
        section.extend_from_slice(&(14u32 + 58).to_be_bytes());
        section.push(3);

        section.push(0); // Source of grid definition
        let points = self.declared_points.unwrap_or(self.ni * self.nj);
        section.extend_from_slice(&points.to_be_bytes());
        section.push(0); // Number of octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&0u16.to_be_bytes());

        section.push(6); // Shape of Earth (spherical with radius 6371229m)
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFFFFFFu32.to_be_bytes()); // Subdivisions

        section.extend_from_slice(&sign_magnitude::<4>(self.la1));
        section.extend_from_slice(&sign_magnitude::<4>(self.lo1));
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&sign_magnitude::<4>(self.la2));
        section.extend_from_slice(&sign_magnitude::<4>(self.lo2));
        section.extend_from_slice(&self.di.to_be_bytes());
        section.extend_from_slice(&self.dj.to_be_bytes());
        section.push(self.scanning_mode);
        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(self.pv.len() as u16).to_be_bytes());
        body.extend_from_slice(&self.product_template().to_be_bytes());

        body.push(self.param_category);
        body.push(self.param_number);
        body.push(2); // Type of generating process (forecast)
        body.push(0); // Background generating process
        body.push(96); // Analysis or forecast process
        body.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        body.push(0); // Minutes of cutoff
        body.push(1); // Time range unit (hours)
        body.extend_from_slice(&self.forecast_hour.to_be_bytes());

        body.push(self.level_type);
        body.extend_from_slice(&sign_magnitude::<1>(self.level_scale_factor as i64));
        body.extend_from_slice(&self.level_value.to_be_bytes());

        match self.second_level {
            Some(bottom) => {
                body.push(self.level_type);
                body.extend_from_slice(&sign_magnitude::<1>(self.level_scale_factor as i64));
                body.extend_from_slice(&bottom.to_be_bytes());
            }
            None => {
                body.push(255);
                body.push(255);
                body.extend_from_slice(&u32::MAX.to_be_bytes());
            }
        }

        if let Some((ensemble_type, perturbation, members)) = self.ensemble {
            body.push(ensemble_type);
            body.push(perturbation);
            body.push(members);
        }

        if let Some((process, hours)) = self.statistics {
            let end_hour = self.hour as u32 + self.forecast_hour + hours;
            body.extend_from_slice(&self.year.to_be_bytes());
            body.push(self.month);
            body.push(self.day + (end_hour / 24) as u8);
            body.push((end_hour % 24) as u8);
            body.push(0); // Minute
            body.push(0); // Second
            body.push(1); // Number of time ranges
            body.extend_from_slice(&0u32.to_be_bytes()); // Missing values in process
            body.push(process);
            body.push(2); // Successive times, forecast time incremented
            body.push(1); // Hours
            body.extend_from_slice(&hours.to_be_bytes());
            body.push(255);
            body.extend_from_slice(&0u32.to_be_bytes());
        }

        for value in &self.pv {
            body.extend_from_slice(&value.to_be_bytes());
        }

        let mut section = Vec::with_capacity(body.len() + 5);
        section.extend_from_slice(&(body.len() as u32 + 5).to_be_bytes());
        section.push(4);
        section.extend_from_slice(&body);
        section
    }

    fn build_sections_5_and_7(&self) -> (Vec<u8>, Vec<u8>) {
        let present = present_values(&self.data_values, self.bitmap.as_deref());
        let reference = present.iter().copied().fold(f64::INFINITY, f64::min);
        let reference = if reference.is_finite() { reference as f32 } else { 0.0 };

        let (binary_scale_factor, packed) = if matches!(self.packing_template, 0 | 41) {
            pack_values(&present, reference as f64)
        } else {
            (0, Vec::new())
        };
        let bits_per_value: u8 = if packed.is_empty() { 0 } else { 16 };
        let packed = if self.packing_template == 41 && !packed.is_empty() {
            png_octets(&packed)
        } else {
            packed
        };

        let mut section5 = Vec::new();
        section5.extend_from_slice(&21u32.to_be_bytes());
        section5.push(5);
        section5.extend_from_slice(&(present.len() as u32).to_be_bytes());
        section5.extend_from_slice(&self.packing_template.to_be_bytes());
        section5.extend_from_slice(&reference.to_be_bytes());
        section5.extend_from_slice(&sign_magnitude::<2>(binary_scale_factor as i64));
        section5.extend_from_slice(&sign_magnitude::<2>(0)); // Decimal scale factor
        section5.push(bits_per_value);
        section5.push(0); // Original field type (floating point)

        let mut section7 = Vec::new();
        section7.extend_from_slice(&(5 + packed.len() as u32).to_be_bytes());
        section7.push(7);
        section7.extend_from_slice(&packed);

        (section5, section7)
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();
        match &self.bitmap {
            Some(mask) => {
                let octets = bitmap_octets(mask);
                section.extend_from_slice(&(6 + octets.len() as u32).to_be_bytes());
                section.push(6);
                section.push(0); // Bitmap follows
                section.extend_from_slice(&octets);
            }
            None => {
                section.extend_from_slice(&6u32.to_be_bytes());
                section.push(6);
                section.push(255); // No bitmap, all data present
            }
        }
        section
    }
}

/// Build a GRIB1 message with the specified parameters.
#[derive(Debug, Clone)]
pub struct Grib1Builder {
    centre: u8,
    table_version: u8,
    indicator: u8,
    level_type: u8,
    level: [u8; 2],
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    p1: u8,
    ni: u16,
    nj: u16,
    with_grid: bool,
    data_values: Vec<f64>,
    bitmap: Option<Vec<bool>>,
}

impl Grib1Builder {
    /// NCEP surface CAPE on a small 3x2 grid.
    pub fn new_cape() -> Self {
        Self {
            centre: 7,
            table_version: 2,
            indicator: 157,
            level_type: 1,
            level: [0, 0],
            year: 2024,
            month: 6,
            day: 1,
            hour: 0,
            p1: 0,
            ni: 3,
            nj: 2,
            with_grid: true,
            data_values: vec![0.0, 120.0, 250.0, 480.0, 1000.0, 1500.0],
            bitmap: None,
        }
    }

    pub fn with_centre(mut self, centre: u8) -> Self {
        self.centre = centre;
        self
    }

    pub fn with_parameter(mut self, indicator: u8) -> Self {
        self.indicator = indicator;
        self
    }

    pub fn with_level(mut self, level_type: u8, level: u16) -> Self {
        self.level_type = level_type;
        self.level = level.to_be_bytes();
        self
    }

    /// Layer level types code top and bottom in one octet each.
    pub fn with_layer(mut self, level_type: u8, top: u8, bottom: u8) -> Self {
        self.level_type = level_type;
        self.level = [top, bottom];
        self
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    pub fn with_forecast_hour(mut self, hour: u8) -> Self {
        self.p1 = hour;
        self
    }

    pub fn with_grid(mut self, ni: u16, nj: u16) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.data_values = vec![0.0; ni as usize * nj as usize];
        self
    }

    /// Omit the grid description section.
    pub fn without_grid(mut self) -> Self {
        self.with_grid = false;
        self
    }

    pub fn with_data(mut self, data: Vec<f64>) -> Self {
        self.data_values = data;
        self
    }

    pub fn with_bitmap(mut self, mask: Vec<bool>) -> Self {
        self.bitmap = Some(mask);
        self
    }

    /// Build the complete GRIB1 message bytes
    pub fn build(&self) -> Vec<u8> {
        let pds = self.build_pds();
        let gds = if self.with_grid { self.build_gds() } else { Vec::new() };
        let bms = self.build_bms();
        let bds = self.build_bds();

        let total = 8 + pds.len() + gds.len() + bms.len() + bds.len() + 4;

        let mut message = Vec::with_capacity(total);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&(total as u32).to_be_bytes()[1..]);
        message.push(1);
        message.extend_from_slice(&pds);
        message.extend_from_slice(&gds);
        message.extend_from_slice(&bms);
        message.extend_from_slice(&bds);
        message.extend_from_slice(b"7777");
        message
    }

    fn build_pds(&self) -> Vec<u8> {
        let century = (self.year - 1) / 100 + 1;
        let year_of_century = self.year - (century - 1) * 100;

        let mut flags = 0u8;
        if self.with_grid {
            flags |= 0x80;
        }
        if self.bitmap.is_some() {
            flags |= 0x40;
        }

        let mut pds = vec![0u8; 28];
        pds[0..3].copy_from_slice(&28u32.to_be_bytes()[1..]);
        pds[3] = self.table_version;
        pds[4] = self.centre;
        pds[5] = 96; // Generating process
        pds[6] = 255; // Grid defined by the GDS
        pds[7] = flags;
        pds[8] = self.indicator;
        pds[9] = self.level_type;
        pds[10..12].copy_from_slice(&self.level);
        pds[12] = year_of_century as u8;
        pds[13] = self.month;
        pds[14] = self.day;
        pds[15] = self.hour;
        pds[16] = 0; // Minute
        pds[17] = 1; // Hours
        pds[18] = self.p1;
        pds[19] = 0;
        pds[20] = 0; // Forecast valid at reference time + P1
        pds[24] = century as u8;
        pds[25] = 0;
        pds[26..28].copy_from_slice(&sign_magnitude::<2>(0));
        pds
    }

    fn build_gds(&self) -> Vec<u8> {
        let mut gds = vec![0u8; 32];
        gds[0..3].copy_from_slice(&32u32.to_be_bytes()[1..]);
        gds[3] = 0; // NV
        gds[4] = 255; // No PV or PL
        gds[5] = 0; // Regular lat/lon
        gds[6..8].copy_from_slice(&self.ni.to_be_bytes());
        gds[8..10].copy_from_slice(&self.nj.to_be_bytes());
        gds[10..13].copy_from_slice(&sign_magnitude::<3>(45_000));
        gds[13..16].copy_from_slice(&sign_magnitude::<3>(-130_000));
        gds[16] = 0x80;
        let last_lat = 45_000 - (self.nj as i64 - 1) * 1000;
        let last_lon = -130_000 + (self.ni as i64 - 1) * 1000;
        gds[17..20].copy_from_slice(&sign_magnitude::<3>(last_lat));
        gds[20..23].copy_from_slice(&sign_magnitude::<3>(last_lon));
        gds[23..25].copy_from_slice(&1000u16.to_be_bytes());
        gds[25..27].copy_from_slice(&1000u16.to_be_bytes());
        gds[27] = 0;
        gds
    }

    fn build_bms(&self) -> Vec<u8> {
        let Some(mask) = &self.bitmap else {
            return Vec::new();
        };
        let octets = bitmap_octets(mask);
        let unused = (octets.len() * 8 - mask.len()) as u8;
        let length = 6 + octets.len();

        let mut bms = Vec::with_capacity(length);
        bms.extend_from_slice(&(length as u32).to_be_bytes()[1..]);
        bms.push(unused);
        bms.extend_from_slice(&[0, 0]); // Bitmap follows
        bms.extend_from_slice(&octets);
        bms
    }

    fn build_bds(&self) -> Vec<u8> {
        let present = present_values(&self.data_values, self.bitmap.as_deref());
        let minimum = present.iter().copied().fold(f64::INFINITY, f64::min);
        let reference_bytes = ibm_float(if minimum.is_finite() { minimum } else { 0.0 });
        let reference = ibm_value(reference_bytes);

        let (binary_scale_factor, packed) = pack_values(&present, reference);
        let bits_per_value: u8 = if packed.is_empty() { 0 } else { 16 };

        let length = 11 + packed.len();
        let mut bds = Vec::with_capacity(length);
        bds.extend_from_slice(&(length as u32).to_be_bytes()[1..]);
        bds.push(0); // Simple grid point packing, no unused bits
        bds.extend_from_slice(&sign_magnitude::<2>(binary_scale_factor as i64));
        bds.extend_from_slice(&reference_bytes);
        bds.push(bits_per_value);
        bds.extend_from_slice(&packed);
        bds
    }
}
