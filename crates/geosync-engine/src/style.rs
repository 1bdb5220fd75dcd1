//! # Raster Style Synthesis
//!
//! Builds a greyscale SLD for a raster from the statistics in its `.vrt`
//! sidecar: black at the minimum, white at the maximum, and a transparent
//! entry for the no-data value when it lies outside that range.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::StyleError;

const KEY_MAXIMUM: &str = "STATISTICS_MAXIMUM";
const KEY_MINIMUM: &str = "STATISTICS_MINIMUM";
const KEY_NODATA: &str = "NoDataValue";

/// Band statistics read from a `.vrt` sidecar.
///
/// The raw text of each value is kept for the style document; the parsed
/// value is used for comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStatistics {
    pub min: Statistic,
    pub max: Statistic,
    pub nodata: Statistic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statistic {
    pub raw: String,
    pub value: f64,
}

impl Statistic {
    fn parse(key: &'static str, raw: &str) -> Result<Self, StyleError> {
        let raw = raw.trim();
        let value = raw.parse::<f64>().map_err(|_| StyleError::InvalidNumber {
            key,
            value: raw.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            value,
        })
    }
}

/// Where the transparent no-data entry goes in the color map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodataPlacement {
    BeforeRamp,
    AfterRamp,
    Omitted,
}

impl RasterStatistics {
    /// Read statistics from a VRT document. The first `MDI` element with a
    /// given key and the first `NoDataValue` element win.
    pub fn from_vrt(xml: &str) -> Result<Self, StyleError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut max = None;
        let mut min = None;
        let mut nodata = None;
        let mut capturing: Option<&'static str> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    capturing = match e.name().as_ref() {
                        b"MDI" => {
                            let key = e
                                .try_get_attribute("key")
                                .map_err(|err| StyleError::Parse(err.to_string()))?;
                            match key.as_ref().map(|a| a.value.as_ref()) {
                                Some(b"STATISTICS_MAXIMUM") if max.is_none() => Some(KEY_MAXIMUM),
                                Some(b"STATISTICS_MINIMUM") if min.is_none() => Some(KEY_MINIMUM),
                                _ => None,
                            }
                        }
                        b"NoDataValue" if nodata.is_none() => Some(KEY_NODATA),
                        _ => None,
                    };
                }
                Ok(Event::Text(t)) => {
                    if let Some(key) = capturing.take() {
                        let text = t.unescape().map_err(|err| StyleError::Parse(err.to_string()))?;
                        let stat = Statistic::parse(key, &text)?;
                        match key {
                            KEY_MAXIMUM => max = Some(stat),
                            KEY_MINIMUM => min = Some(stat),
                            _ => nodata = Some(stat),
                        }
                    }
                }
                Ok(Event::End(_)) => capturing = None,
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(StyleError::Parse(err.to_string())),
            }
        }

        let stats = Self {
            max: max.ok_or(StyleError::MissingStatistic(KEY_MAXIMUM))?,
            min: min.ok_or(StyleError::MissingStatistic(KEY_MINIMUM))?,
            nodata: nodata.ok_or(StyleError::MissingStatistic(KEY_NODATA))?,
        };
        if !(stats.min.value < stats.max.value) {
            return Err(StyleError::EmptyRange {
                min: stats.min.raw,
                max: stats.max.raw,
            });
        }
        Ok(stats)
    }

    pub fn nodata_placement(&self) -> NodataPlacement {
        if self.nodata.value < self.min.value {
            NodataPlacement::BeforeRamp
        } else if self.nodata.value > self.max.value {
            NodataPlacement::AfterRamp
        } else {
            NodataPlacement::Omitted
        }
    }
}

/// Render the greyscale SLD for a layer.
pub fn render_sld(style_name: &str, stats: &RasterStatistics) -> String {
    let nodata = format!(
        r##"<ColorMapEntry color="#000000" quantity="{}" label="nodata" opacity="0.0"/>"##,
        escape(stats.nodata.raw.as_str())
    );
    let (before, after) = match stats.nodata_placement() {
        NodataPlacement::BeforeRamp => (nodata.as_str(), ""),
        NodataPlacement::AfterRamp => ("", nodata.as_str()),
        NodataPlacement::Omitted => ("", ""),
    };

    format!(
        r##"<?xml version="1.0" encoding="UTF-8"?>
<StyledLayerDescriptor version="1.0.0" xmlns="http://www.opengis.net/sld" xmlns:ogc="http://www.opengis.net/ogc" xmlns:xlink="http://www.w3.org/1999/xlink" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://www.opengis.net/sld http://schemas.opengis.net/sld/1.0.0/StyledLayerDescriptor.xsd">
  <NamedLayer>
    <Name>simpleraster</Name>
    <UserStyle>
      <Name>{name}</Name>
      <Title>Default raster style</Title>
      <Abstract>Default greyscale raster style</Abstract>
      <FeatureTypeStyle>
        <Rule>
          <RasterSymbolizer>
            <Opacity>1.0</Opacity>
            <ColorMap>
              {before}
              <ColorMapEntry color="#000000" quantity="{min}" label="values"/>
              <ColorMapEntry color="#FFFFFF" quantity="{max}" label="values"/>
              {after}
            </ColorMap>
          </RasterSymbolizer>
        </Rule>
      </FeatureTypeStyle>
    </UserStyle>
  </NamedLayer>
</StyledLayerDescriptor>
"##,
        name = escape(style_name),
        min = escape(stats.min.raw.as_str()),
        max = escape(stats.max.raw.as_str()),
    )
}

/// Source path of a raster's statistics sidecar: same path, `.vrt`.
pub fn vrt_path(source_path: &str) -> String {
    format!("{}.vrt", geosync_core::strip_extension(source_path))
}
