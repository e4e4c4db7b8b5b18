use bytemuck_derive::{Pod, Zeroable};
use core::mem;
use glam::{Vec2, Vec3};
use static_assertions::const_assert_eq;

pub const MESHLET_MAX_VERTICES: u32 = 64;
pub const MESHLET_MAX_TRIANGLES: u32 = 124;
pub const MAX_LODS: usize = 8;

#[derive(Copy, Clone, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
#[repr(C)]
pub struct Vertex {
	pub position: [f32; 3],
	/// xyz normal as unorm8, w unused
	pub normal: u32,
	/// two f16 texture coordinates
	pub tex_coord: u32,
}
const_assert_eq!(mem::size_of::<Vertex>(), 5 * 4);

impl Vertex {
	pub fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
		Self {
			position: position.to_array(),
			normal: Self::pack_normal(normal),
			tex_coord: f32_to_f16_bits(tex_coord.x) | (f32_to_f16_bits(tex_coord.y) << 16),
		}
	}

	pub fn position(&self) -> Vec3 {
		Vec3::from(self.position)
	}

	pub fn normal(&self) -> Vec3 {
		let channel = |shift: u32| ((self.normal >> shift) & 0xff) as f32 / 127.5 - 1.;
		Vec3::new(channel(0), channel(8), channel(16))
	}

	pub fn pack_normal(normal: Vec3) -> u32 {
		let n = (normal.clamp(Vec3::splat(-1.), Vec3::ONE) * 127.5 + 127.5).round();
		(n.x as u32) | ((n.y as u32) << 8) | ((n.z as u32) << 16)
	}

	pub fn tex_coord(&self) -> Vec2 {
		Vec2::new(
			f16_bits_to_f32(self.tex_coord & 0xffff),
			f16_bits_to_f32(self.tex_coord >> 16),
		)
	}
}

/// Decodes IEEE half floats without requiring the `Float16` capability.
pub fn f16_bits_to_f32(bits: u32) -> f32 {
	let sign = (bits >> 15) & 1;
	let exponent = (bits >> 10) & 0x1f;
	let mantissa = bits & 0x3ff;
	let magnitude = if exponent == 0 {
		mantissa as f32 * (1. / 16_777_216.)
	} else if exponent == 0x1f {
		f32::MAX
	} else {
		f32::from_bits(((exponent + 127 - 15) << 23) | (mantissa << 13))
	};
	if sign == 1 { -magnitude } else { magnitude }
}

/// Rounds to the nearest half float, flushing subnormals to zero.
pub fn f32_to_f16_bits(value: f32) -> u32 {
	let bits = value.to_bits();
	let sign = (bits >> 16) & 0x8000;
	let exponent = ((bits >> 23) & 0xff) as i32 - 127 + 15;
	let mantissa = bits & 0x7f_ffff;
	if exponent <= 0 {
		sign
	} else if exponent >= 0x1f {
		sign | 0x7c00
	} else {
		// a carry out of the mantissa correctly bumps the exponent
		let half = ((exponent as u32) << 10) | (mantissa >> 13);
		sign | u32::min(half + ((mantissa >> 12) & 1), 0x7c00)
	}
}

/// A cluster of up to [`MESHLET_MAX_TRIANGLES`] triangles referencing up to [`MESHLET_MAX_VERTICES`] vertices.
///
/// `data_offset` points into the packed meshlet data: first `vertex_count` vertex indices relative to the mesh's
/// vertex offset, then the local triangle indices packed as four `u8` per word.
#[derive(Copy, Clone, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
#[repr(C)]
pub struct Meshlet {
	pub center: [f32; 3],
	pub radius: f32,
	/// cone axis xyz and cutoff, each a snorm8
	pub cone: u32,
	pub data_offset: u32,
	pub vertex_count: u32,
	pub triangle_count: u32,
}
const_assert_eq!(mem::size_of::<Meshlet>(), 8 * 4);

impl Meshlet {
	pub fn center(&self) -> Vec3 {
		Vec3::from(self.center)
	}

	pub fn pack_cone(axis: [i8; 3], cutoff: i8) -> u32 {
		(axis[0] as u8 as u32) | ((axis[1] as u8 as u32) << 8) | ((axis[2] as u8 as u32) << 16) | ((cutoff as u8 as u32) << 24)
	}

	fn cone_channel(&self, shift: u32) -> f32 {
		// sign extend without going through 8 bit integers
		(((self.cone << (24 - shift)) as i32) >> 24) as f32 / 127.
	}

	pub fn cone_axis(&self) -> Vec3 {
		Vec3::new(self.cone_channel(0), self.cone_channel(8), self.cone_channel(16))
	}

	pub fn cone_cutoff(&self) -> f32 {
		self.cone_channel(24)
	}

	/// Word index of the packed triangle indices.
	pub fn triangle_data_offset(&self) -> u32 {
		self.data_offset + self.vertex_count
	}

	/// Number of words this meshlet occupies in the packed meshlet data.
	pub fn data_len(&self) -> u32 {
		self.vertex_count + triangle_words(self.triangle_count)
	}
}

pub const fn triangle_words(triangle_count: u32) -> u32 {
	(triangle_count * 3).div_ceil(4)
}

/// Load the local vertex indices of a meshlet triangle from the packed meshlet data.
pub fn load_triangle(meshlet: &Meshlet, triangle: u32, load_word: impl Fn(u32) -> u32) -> [u32; 3] {
	let base = triangle * 3;
	let index = |i: u32| {
		let word = load_word(meshlet.triangle_data_offset() + i / 4);
		(word >> ((i % 4) * 8)) & 0xff
	};
	[index(base), index(base + 1), index(base + 2)]
}

#[derive(Copy, Clone, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
#[repr(C)]
pub struct MeshLod {
	pub index_offset: u32,
	pub index_count: u32,
	pub meshlet_offset: u32,
	pub meshlet_count: u32,
	/// object space simplification error relative to LOD 0
	pub error: f32,
}
const_assert_eq!(mem::size_of::<MeshLod>(), 5 * 4);

#[derive(Copy, Clone, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
#[repr(C)]
pub struct Mesh {
	pub center: [f32; 3],
	pub radius: f32,
	pub vertex_offset: u32,
	pub vertex_count: u32,
	pub lod_count: u32,
	pub _pad: u32,
	pub lods: [MeshLod; MAX_LODS],
}
const_assert_eq!(mem::size_of::<Mesh>(), 8 * 4 + MAX_LODS * mem::size_of::<MeshLod>());

impl Mesh {
	pub fn center(&self) -> Vec3 {
		Vec3::from(self.center)
	}

	pub fn lod(&self, lod_index: u32) -> MeshLod {
		self.lods[u32::min(lod_index, self.lod_count - 1) as usize]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	#[test]
	fn normal_packing() {
		let normal = Vec3::new(0.6, -0.8, 0.).normalize();
		let vertex = Vertex {
			normal: Vertex::pack_normal(normal),
			..Vertex::default()
		};
		let unpacked = vertex.normal();
		assert_relative_eq!(unpacked.x, normal.x, epsilon = 0.01);
		assert_relative_eq!(unpacked.y, normal.y, epsilon = 0.01);
		assert_relative_eq!(unpacked.z, normal.z, epsilon = 0.01);
	}

	#[test]
	fn half_float_decoding() {
		assert_eq!(f16_bits_to_f32(0x3c00), 1.);
		assert_eq!(f16_bits_to_f32(0x3800), 0.5);
		assert_eq!(f16_bits_to_f32(0xc000), -2.);
		assert_eq!(f16_bits_to_f32(0), 0.);
		for value in [0.25, 1., -3.5, 0.999, 1024.] {
			assert_relative_eq!(f16_bits_to_f32(f32_to_f16_bits(value)), value, max_relative = 1e-3);
		}
	}

	#[test]
	fn cone_sign_extension() {
		let meshlet = Meshlet {
			cone: Meshlet::pack_cone([-127, 0, 127], -64),
			..Meshlet::default()
		};
		let axis = meshlet.cone_axis();
		assert_relative_eq!(axis.x, -1.);
		assert_relative_eq!(axis.y, 0.);
		assert_relative_eq!(axis.z, 1.);
		assert_relative_eq!(meshlet.cone_cutoff(), -64. / 127.);
	}

	#[test]
	fn triangle_unpacking() {
		let meshlet = Meshlet {
			data_offset: 2,
			vertex_count: 3,
			triangle_count: 2,
			..Meshlet::default()
		};
		// 2 unrelated words, 3 vertex indices, then indices 0 1 2 | 2 1 0 packed
		let data = [99, 99, 7, 8, 9, 0x02_02_01_00, 0x00_00_00_01];
		assert_eq!(meshlet.data_len(), 3 + 2);
		assert_eq!(load_triangle(&meshlet, 0, |i| data[i as usize]), [0, 1, 2]);
		assert_eq!(load_triangle(&meshlet, 1, |i| data[i as usize]), [2, 1, 0]);
	}
}
