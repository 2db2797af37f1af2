//! Quantization size table
//!
//! Bytes-per-element for every GGML tensor type, expressed as the
//! `(block_bytes, block_elements)` pair of the on-disk block layout. Sub-byte
//! and block-structured formats therefore resolve to fractional bytes per
//! element: Q4_0 stores 32 elements in 18 bytes (one f16 scale plus 16 bytes
//! of nibbles), i.e. 0.5625 bytes/element.
//!
//! The values are configuration data taken from the ggml type traits, never
//! derived at runtime. Reference: ggml/src/ggml-common.h block structs.

use serde::Serialize;
use std::fmt;

/// GGML tensor types (ggml_type enum values from ggml.h)
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum QuantType {
    F32 = 0,
    F16 = 1,
    Q4_0 = 2,
    Q4_1 = 3,
    Q5_0 = 6,
    Q5_1 = 7,
    Q8_0 = 8,
    Q8_1 = 9,
    Q2_K = 10,
    Q3_K = 11,
    Q4_K = 12,
    Q5_K = 13,
    Q6_K = 14,
    Q8_K = 15,
    IQ2_XXS = 16,
    IQ2_XS = 17,
    IQ3_XXS = 18,
    IQ1_S = 19,
    IQ4_NL = 20,
    IQ3_S = 21,
    IQ2_S = 22,
    IQ4_XS = 23,
    I8 = 24,
    I16 = 25,
    I32 = 26,
    I64 = 27,
    F64 = 28,
    IQ1_M = 29,
    BF16 = 30,
    TQ1_0 = 34,
    TQ2_0 = 35,
    MXFP4 = 39,
}

impl QuantType {
    /// Every supported type, in GGML id order
    pub const ALL: &'static [QuantType] = &[
        QuantType::F32,
        QuantType::F16,
        QuantType::Q4_0,
        QuantType::Q4_1,
        QuantType::Q5_0,
        QuantType::Q5_1,
        QuantType::Q8_0,
        QuantType::Q8_1,
        QuantType::Q2_K,
        QuantType::Q3_K,
        QuantType::Q4_K,
        QuantType::Q5_K,
        QuantType::Q6_K,
        QuantType::Q8_K,
        QuantType::IQ2_XXS,
        QuantType::IQ2_XS,
        QuantType::IQ3_XXS,
        QuantType::IQ1_S,
        QuantType::IQ4_NL,
        QuantType::IQ3_S,
        QuantType::IQ2_S,
        QuantType::IQ4_XS,
        QuantType::I8,
        QuantType::I16,
        QuantType::I32,
        QuantType::I64,
        QuantType::F64,
        QuantType::IQ1_M,
        QuantType::BF16,
        QuantType::TQ1_0,
        QuantType::TQ2_0,
        QuantType::MXFP4,
    ];

    /// Parse a GGML type id as stored in GGUF tensor infos
    pub fn from_ggml_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.ggml_id() == id)
    }

    /// Parse a quantization tag such as `Q4_K` or `bf16` (case-insensitive)
    pub fn from_tag(tag: &str) -> Option<Self> {
        let upper = tag.trim().to_ascii_uppercase();
        match upper.as_str() {
            "FP32" => return Some(QuantType::F32),
            "FP16" => return Some(QuantType::F16),
            _ => {}
        }
        Self::ALL.iter().copied().find(|t| t.name() == upper)
    }

    pub fn ggml_id(&self) -> u32 {
        *self as u32
    }

    /// Canonical tag
    pub fn name(&self) -> &'static str {
        match self {
            QuantType::F32 => "F32",
            QuantType::F16 => "F16",
            QuantType::Q4_0 => "Q4_0",
            QuantType::Q4_1 => "Q4_1",
            QuantType::Q5_0 => "Q5_0",
            QuantType::Q5_1 => "Q5_1",
            QuantType::Q8_0 => "Q8_0",
            QuantType::Q8_1 => "Q8_1",
            QuantType::Q2_K => "Q2_K",
            QuantType::Q3_K => "Q3_K",
            QuantType::Q4_K => "Q4_K",
            QuantType::Q5_K => "Q5_K",
            QuantType::Q6_K => "Q6_K",
            QuantType::Q8_K => "Q8_K",
            QuantType::IQ2_XXS => "IQ2_XXS",
            QuantType::IQ2_XS => "IQ2_XS",
            QuantType::IQ3_XXS => "IQ3_XXS",
            QuantType::IQ1_S => "IQ1_S",
            QuantType::IQ4_NL => "IQ4_NL",
            QuantType::IQ3_S => "IQ3_S",
            QuantType::IQ2_S => "IQ2_S",
            QuantType::IQ4_XS => "IQ4_XS",
            QuantType::I8 => "I8",
            QuantType::I16 => "I16",
            QuantType::I32 => "I32",
            QuantType::I64 => "I64",
            QuantType::F64 => "F64",
            QuantType::IQ1_M => "IQ1_M",
            QuantType::BF16 => "BF16",
            QuantType::TQ1_0 => "TQ1_0",
            QuantType::TQ2_0 => "TQ2_0",
            QuantType::MXFP4 => "MXFP4",
        }
    }

    /// `(bytes per block, elements per block)` of the storage layout
    pub fn block_layout(&self) -> (u64, u64) {
        match self {
            // Plain floating point and integers: one element per "block"
            QuantType::F64 => (8, 1),
            QuantType::F32 => (4, 1),
            QuantType::F16 | QuantType::BF16 => (2, 1),
            QuantType::I64 => (8, 1),
            QuantType::I32 => (4, 1),
            QuantType::I16 => (2, 1),
            QuantType::I8 => (1, 1),

            // Uniform 32-element blocks: f16 scale (+ f16 min/sum) + quants
            QuantType::Q4_0 => (18, 32), // 2 + 16
            QuantType::Q4_1 => (20, 32), // 2 + 2 + 16
            QuantType::Q5_0 => (22, 32), // 2 + 4 high bits + 16
            QuantType::Q5_1 => (24, 32), // 2 + 2 + 4 + 16
            QuantType::Q8_0 => (34, 32), // 2 + 32
            QuantType::Q8_1 => (36, 32), // 2 + 2 + 32

            // K-series super-blocks of 256 elements
            QuantType::Q2_K => (84, 256),  // 16 scales + 64 quants + 2 + 2
            QuantType::Q3_K => (110, 256), // 32 hmask + 64 quants + 12 scales + 2
            QuantType::Q4_K => (144, 256), // 2 + 2 + 12 scales + 128 quants
            QuantType::Q5_K => (176, 256), // 2 + 2 + 12 + 32 high bits + 128
            QuantType::Q6_K => (210, 256), // 128 ql + 64 qh + 16 scales + 2
            QuantType::Q8_K => (292, 256), // 4 (f32 d) + 256 + 32 bsums

            // Importance-aware low-bit formats
            QuantType::IQ2_XXS => (66, 256),
            QuantType::IQ2_XS => (74, 256),
            QuantType::IQ2_S => (82, 256),
            QuantType::IQ3_XXS => (98, 256),
            QuantType::IQ3_S => (110, 256),
            QuantType::IQ1_S => (50, 256),
            QuantType::IQ1_M => (56, 256),
            QuantType::IQ4_NL => (18, 32),
            QuantType::IQ4_XS => (136, 256),

            // Ternary and microscaling formats
            QuantType::TQ1_0 => (54, 256),
            QuantType::TQ2_0 => (66, 256),
            QuantType::MXFP4 => (17, 32), // 1 (e8m0 scale) + 16
        }
    }

    /// Approximate bytes per element
    pub fn bytes_per_element(&self) -> f64 {
        let (bytes, elements) = self.block_layout();
        bytes as f64 / elements as f64
    }

    /// Storage size of `elements` elements, rounded up to a whole byte
    pub fn size_bytes(&self, elements: u64) -> u64 {
        let (bytes, block) = self.block_layout();
        let total = (elements as u128 * bytes as u128).div_ceil(block as u128);
        u64::try_from(total).unwrap_or(u64::MAX)
    }

    /// Check if this is a block-quantized type
    pub fn is_quantized(&self) -> bool {
        self.block_layout().1 > 1
    }
}

impl fmt::Display for QuantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
