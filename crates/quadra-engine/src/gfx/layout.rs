/// Scalar component type of a vertex attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// 32-bit float.
    Float,
    /// 32-bit unsigned integer.
    UInt32,
    /// 8-bit unsigned integer, read normalized to `[0, 1]`.
    UByte,
}

impl ScalarKind {
    /// Size of one component in bytes.
    #[inline]
    pub const fn size_bytes(self) -> u32 {
        match self {
            ScalarKind::Float => 4,
            ScalarKind::UInt32 => 4,
            ScalarKind::UByte => 1,
        }
    }

    /// Whether integer values are mapped to `[0, 1]` when read by a shader.
    #[inline]
    pub const fn normalized(self) -> bool {
        matches!(self, ScalarKind::UByte)
    }
}

/// One attribute slot of a vertex record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub count: u32,
    pub kind: ScalarKind,
    pub normalized: bool,
}

impl VertexAttribute {
    /// Bytes this attribute occupies inside one vertex.
    #[inline]
    pub const fn size_bytes(&self) -> u32 {
        self.count * self.kind.size_bytes()
    }
}

/// Describes how the bytes of a vertex buffer map to shader inputs.
///
/// Attributes are tightly packed in push order; attribute `i` feeds shader
/// input location `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u32,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `count` components of `kind` and advances the stride.
    pub fn push(&mut self, kind: ScalarKind, count: u32) -> &mut Self {
        debug_assert!((1..=4).contains(&count), "attribute component count must be 1..=4");

        let attribute = VertexAttribute {
            count,
            kind,
            normalized: kind.normalized(),
        };
        self.stride += attribute.size_bytes();
        self.attributes.push(attribute);
        self
    }

    #[inline]
    pub fn push_f32(&mut self, count: u32) -> &mut Self {
        self.push(ScalarKind::Float, count)
    }

    #[inline]
    pub fn push_u32(&mut self, count: u32) -> &mut Self {
        self.push(ScalarKind::UInt32, count)
    }

    #[inline]
    pub fn push_u8(&mut self, count: u32) -> &mut Self {
        self.push(ScalarKind::UByte, count)
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Total bytes per vertex.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Running byte offset of every attribute, in push order.
    pub fn offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.attributes.iter().scan(0u32, |offset, attr| {
            let current = *offset;
            *offset += attr.size_bytes();
            Some(current)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_sizes() {
        assert_eq!(ScalarKind::Float.size_bytes(), 4);
        assert_eq!(ScalarKind::UInt32.size_bytes(), 4);
        assert_eq!(ScalarKind::UByte.size_bytes(), 1);
    }

    #[test]
    fn only_bytes_are_normalized() {
        let mut layout = VertexLayout::new();
        layout.push_f32(3).push_u32(1).push_u8(4);

        let flags: Vec<bool> = layout.attributes().iter().map(|a| a.normalized).collect();
        assert_eq!(flags, [false, false, true]);
    }

    #[test]
    fn two_vec2_floats() {
        let mut layout = VertexLayout::new();
        layout.push_f32(2).push_f32(2);

        assert_eq!(layout.stride(), 16);
        assert_eq!(layout.offsets().collect::<Vec<_>>(), [0, 8]);
    }

    #[test]
    fn stride_is_sum_of_attribute_sizes() {
        let mut layout = VertexLayout::new();
        layout.push_f32(3).push_u8(4).push_u32(2).push_u8(1);

        assert_eq!(layout.stride(), 3 * 4 + 4 + 2 * 4 + 1);
        assert_eq!(layout.offsets().collect::<Vec<_>>(), [0, 12, 16, 24]);
    }

    #[test]
    fn empty_layout() {
        let layout = VertexLayout::new();
        assert_eq!(layout.stride(), 0);
        assert_eq!(layout.offsets().count(), 0);
    }
}
