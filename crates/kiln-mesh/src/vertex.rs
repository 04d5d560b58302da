//! Vertex channel layouts.
//!
//! A mesh's vertex data is one or more interleaved streams. Each channel
//! names the stream it lives in, its byte offset within a vertex, its
//! numeric format and its component count. Format codes and channel order
//! changed between engine generations; both are resolved against the
//! engine version here.

use half::f16;
use kiln_common::{align_up, BinaryReader, Endian, UnityVersion};
use kiln_serialized::Value;

use crate::fields::{array_of, u32_of};
use crate::geometry::{reshape, Geometry, UvChannel};
use crate::{Error, Result};

/// Streams start on 16-byte boundaries.
const STREAM_ALIGN: usize = 16;

/// Numeric format of a vertex component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum VertexFormat {
    Float,
    Float16,
    UNorm8,
    SNorm8,
    UNorm16,
    SNorm16,
    UInt8,
    SInt8,
    UInt16,
    SInt16,
    UInt32,
    SInt32,
}

impl VertexFormat {
    /// Map a stored format code for the given engine version.
    pub fn from_raw(raw: u8, version: &UnityVersion) -> Option<Self> {
        use VertexFormat::*;

        if version.major < 2017 {
            // Float, Float16, Color, Byte, UInt32
            return match raw {
                0 => Some(Float),
                1 => Some(Float16),
                2 => Some(UNorm8),
                3 => Some(UInt8),
                4 => Some(UInt32),
                _ => None,
            };
        }

        let table: &[VertexFormat] = if version.major < 2019 {
            // 2017 and 2018 keep a distinct `Color` code at 2.
            &[
                Float, Float16, UNorm8, UNorm8, SNorm8, UNorm16, SNorm16, UInt8, SInt8, UInt16,
                SInt16, UInt32, SInt32,
            ]
        } else {
            &[
                Float, Float16, UNorm8, SNorm8, UNorm16, SNorm16, UInt8, SInt8, UInt16, SInt16,
                UInt32, SInt32,
            ]
        };
        table.get(raw as usize).copied()
    }

    /// Bytes per component.
    pub const fn size(self) -> usize {
        use VertexFormat::*;
        match self {
            Float | UInt32 | SInt32 => 4,
            Float16 | UNorm16 | SNorm16 | UInt16 | SInt16 => 2,
            UNorm8 | SNorm8 | UInt8 | SInt8 => 1,
        }
    }

    fn read(self, reader: &mut BinaryReader<'_>) -> Result<f32> {
        use VertexFormat::*;
        Ok(match self {
            Float => reader.read_f32()?,
            Float16 => f16::from_bits(reader.read_u16()?).to_f32(),
            UNorm8 => reader.read_u8()? as f32 / 255.0,
            SNorm8 => (reader.read_i8()? as f32 / 127.0).max(-1.0),
            UNorm16 => reader.read_u16()? as f32 / 65535.0,
            SNorm16 => (reader.read_i16()? as f32 / 32767.0).max(-1.0),
            UInt8 => reader.read_u8()? as f32,
            SInt8 => reader.read_i8()? as f32,
            UInt16 => reader.read_u16()? as f32,
            SInt16 => reader.read_i16()? as f32,
            UInt32 => reader.read_u32()? as f32,
            SInt32 => reader.read_i32()? as f32,
        })
    }
}

/// What a channel slot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttribute {
    Position,
    Normal,
    Tangent,
    Color,
    TexCoord(u8),
    BlendWeight,
    BlendIndices,
}

impl VertexAttribute {
    /// The attribute stored in channel slot `index`.
    ///
    /// From 2018 there are fourteen slots with tangents after normals;
    /// earlier engines have eight with tangents last.
    pub fn for_channel(index: usize, version: &UnityVersion) -> Option<Self> {
        use VertexAttribute::*;

        if version.major >= 2018 {
            match index {
                0 => Some(Position),
                1 => Some(Normal),
                2 => Some(Tangent),
                3 => Some(Color),
                4..=11 => Some(TexCoord((index - 4) as u8)),
                12 => Some(BlendWeight),
                13 => Some(BlendIndices),
                _ => None,
            }
        } else {
            match index {
                0 => Some(Position),
                1 => Some(Normal),
                2 => Some(Color),
                3..=6 => Some(TexCoord((index - 3) as u8)),
                7 => Some(Tangent),
                _ => None,
            }
        }
    }
}

/// Placement of one channel within the vertex streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ChannelInfo {
    pub stream: u8,
    pub offset: u8,
    /// Stored format code; see [`VertexFormat::from_raw`].
    pub format: u8,
    /// Component count. Upper bits carry flags on newer engines.
    pub dimension: u8,
}

impl ChannelInfo {
    pub fn from_value(value: &Value<'_>) -> Result<Self> {
        let byte = |name: &str| -> Result<u8> {
            u8::try_from(u32_of(value, name)?).map_err(|_| Error::unexpected(name, "byte"))
        };
        Ok(Self {
            stream: byte("stream")?,
            offset: byte("offset")?,
            format: byte("format")?,
            dimension: byte("dimension")?,
        })
    }

    /// Components per vertex with flag bits removed.
    #[inline]
    pub fn components(&self) -> usize {
        (self.dimension & 0x0F) as usize
    }
}

/// One interleaved vertex stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct StreamInfo {
    pub channel_mask: u32,
    pub offset: u32,
    pub stride: u32,
}

impl StreamInfo {
    pub fn from_value(value: &Value<'_>) -> Result<Self> {
        Ok(Self {
            channel_mask: u32_of(value, "channelMask")?,
            offset: u32_of(value, "offset")?,
            stride: u32_of(value, "stride")?,
        })
    }
}

/// Channel layout and raw bytes of a mesh's vertices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VertexData {
    pub vertex_count: u32,
    pub channels: Vec<ChannelInfo>,
    /// Stored stream table; engines from 5.0 on derive it from the channels.
    pub streams: Option<Vec<StreamInfo>>,
    /// Inline bytes, empty when the data is streamed from a sibling node.
    pub data: Vec<u8>,
}

impl VertexData {
    pub fn from_value(value: &Value<'_>) -> Result<Self> {
        let channels = match value.get("m_Channels") {
            Some(_) => array_of(value, "m_Channels")?
                .iter()
                .map(ChannelInfo::from_value)
                .collect::<Result<_>>()?,
            None => Vec::new(),
        };
        let streams = match value.get("m_Streams") {
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(StreamInfo::from_value)
                    .collect::<Result<_>>()?,
            ),
            // Fixed four-stream layouts decode as a struct of elements.
            Some(Value::Struct(fields)) => Some(
                fields
                    .values()
                    .map(StreamInfo::from_value)
                    .collect::<Result<_>>()?,
            ),
            Some(_) => return Err(Error::unexpected("m_Streams", "stream table")),
            None => None,
        };

        Ok(Self {
            vertex_count: u32_of(value, "m_VertexCount")?,
            channels,
            streams,
            data: crate::fields::bytes_of(value, "m_DataSize")?.into_owned(),
        })
    }

    /// Stream table, derived from the channels when not stored.
    ///
    /// Each stream's stride is the sum of its channels' widths; streams are
    /// laid out back to back, each padded to 16 bytes.
    pub fn stream_table(&self, version: &UnityVersion) -> Result<Vec<StreamInfo>> {
        if let Some(streams) = &self.streams {
            return Ok(streams.clone());
        }

        let stream_count = self
            .channels
            .iter()
            .map(|c| c.stream as usize + 1)
            .max()
            .unwrap_or(0);

        let mut streams = Vec::with_capacity(stream_count);
        let mut offset = 0usize;
        for s in 0..stream_count {
            let mut mask = 0u32;
            let mut stride = 0usize;
            for (index, channel) in self.channels.iter().enumerate() {
                if channel.stream as usize != s || channel.components() == 0 {
                    continue;
                }
                let format = VertexFormat::from_raw(channel.format, version).ok_or(
                    Error::UnknownVertexFormat {
                        channel: index,
                        format: channel.format,
                    },
                )?;
                mask |= 1u32.checked_shl(index as u32).unwrap_or(0);
                stride += channel.components() * format.size();
            }
            streams.push(StreamInfo {
                channel_mask: mask,
                offset: offset as u32,
                stride: stride as u32,
            });
            let size = (self.vertex_count as usize).saturating_mul(stride);
            offset = align_up(offset.saturating_add(size), STREAM_ALIGN);
        }
        Ok(streams)
    }

    /// Decode every populated channel of `data` into `geometry`.
    ///
    /// `data` is the inline buffer or the streamed resource slice.
    pub fn decode_into(
        &self,
        data: &[u8],
        version: &UnityVersion,
        endian: Endian,
        geometry: &mut Geometry,
    ) -> Result<()> {
        let streams = self.stream_table(version)?;
        let vertex_count = self.vertex_count as usize;
        geometry.vertex_count = vertex_count;

        for (index, channel) in self.channels.iter().enumerate() {
            let dimension = channel.components();
            if dimension == 0 || vertex_count == 0 {
                continue;
            }
            let Some(attribute) = VertexAttribute::for_channel(index, version) else {
                continue;
            };
            let format = VertexFormat::from_raw(channel.format, version).ok_or(
                Error::UnknownVertexFormat {
                    channel: index,
                    format: channel.format,
                },
            )?;
            let stream = streams
                .get(channel.stream as usize)
                .ok_or_else(|| Error::unexpected("m_Channels", "channel in a known stream"))?;

            let values = read_channel(data, stream, channel, format, vertex_count, endian)
                .map_err(|e| match e {
                    Error::Common(kiln_common::Error::UnexpectedEof { .. }) => {
                        Error::VertexDataOverrun {
                            channel: index,
                            available: data.len(),
                        }
                    }
                    other => other,
                })?;

            match attribute {
                VertexAttribute::Position => geometry.positions = reshape(values, dimension, 3),
                VertexAttribute::Normal => geometry.normals = reshape(values, dimension, 3),
                VertexAttribute::Tangent => geometry.tangents = reshape(values, dimension, 4),
                VertexAttribute::Color => geometry.colors = reshape(values, dimension, 4),
                VertexAttribute::TexCoord(set) => {
                    geometry.uvs[set as usize] = Some(UvChannel {
                        dimension: dimension as u8,
                        values,
                    });
                }
                VertexAttribute::BlendWeight => {
                    geometry.bone_weights = values
                        .chunks_exact(dimension)
                        .map(|w| {
                            let mut slot = [0.0; 4];
                            for (dst, src) in slot.iter_mut().zip(w) {
                                *dst = *src;
                            }
                            slot
                        })
                        .collect();
                }
                VertexAttribute::BlendIndices => {
                    geometry.bone_indices = values
                        .chunks_exact(dimension)
                        .map(|b| {
                            let mut slot = [0u32; 4];
                            for (dst, src) in slot.iter_mut().zip(b) {
                                *dst = *src as u32;
                            }
                            slot
                        })
                        .collect();
                }
            }
        }

        Ok(())
    }
}

fn read_channel(
    data: &[u8],
    stream: &StreamInfo,
    channel: &ChannelInfo,
    format: VertexFormat,
    vertex_count: usize,
    endian: Endian,
) -> Result<Vec<f32>> {
    let dimension = channel.components();
    let base = stream.offset as usize + channel.offset as usize;
    let stride = stream.stride as usize;
    let width = dimension * format.size();

    if stride == 0 && vertex_count > 1 {
        return Err(Error::unexpected("m_Streams", "non-zero stride for multiple vertices"));
    }

    let last = vertex_count
        .saturating_sub(1)
        .checked_mul(stride)
        .and_then(|span| span.checked_add(base + width));
    match last {
        Some(last) if last <= data.len() => {}
        _ => {
            return Err(kiln_common::Error::UnexpectedEof {
                offset: base,
                needed: last.map_or(usize::MAX, |last| last - base),
                available: data.len().saturating_sub(base),
            }
            .into());
        }
    }

    let mut reader = BinaryReader::with_endian(data, endian);
    let reserve = vertex_count
        .saturating_mul(dimension)
        .min(data.len() / format.size().max(1));
    let mut values = Vec::with_capacity(reserve);
    for vertex in 0..vertex_count {
        reader.seek(base + vertex * stride);
        for _ in 0..dimension {
            values.push(format.read(&mut reader)?);
        }
    }
    Ok(values)
}
