//! Textual layer-manifest parsing and loading for the CLI (spec S6).
//!
//! A manifest is a plain-text file: a `WIDTHxHEIGHT` header line followed by
//! one line per layer, `image_path[,mask_path],offset_x,offset_y`. A missing
//! `mask_path` means the layer is fully opaque.

use std::path::{Path, PathBuf};

use log::info;

use crate::error::CompositeError;
use crate::grid::PixelGrid;
use crate::layer::Layer;

/// One parsed manifest line, before the referenced images are loaded.
#[derive(Debug, PartialEq, Eq)]
pub struct LayerSpec {
	pub image_path: String,
	pub mask_path: Option<String>,
	pub offset_x: isize,
	pub offset_y: isize,
}

/// A fully parsed, not-yet-loaded manifest.
#[derive(Debug, PartialEq, Eq)]
pub struct Manifest {
	pub width: usize,
	pub height: usize,
	pub layers: Vec<LayerSpec>,
}

/// Parses the textual manifest format. Blank lines and lines starting with
/// `#` are ignored.
pub fn parse_manifest(text: &str) -> Result<Manifest, CompositeError> {
	let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#'));

	let header = lines
		.next()
		.ok_or_else(|| CompositeError::Manifest("empty manifest".into()))?;
	let (width, height) = parse_dimensions(header)?;

	let mut layers = Vec::new();
	for line in lines {
		layers.push(parse_layer_line(line)?);
	}
	if layers.is_empty() {
		return Err(CompositeError::Manifest("manifest declares no layers".into()));
	}

	Ok(Manifest { width, height, layers })
}

fn parse_dimensions(header: &str) -> Result<(usize, usize), CompositeError> {
	let mut parts = header.split('x');
	let w = parts.next().ok_or_else(|| CompositeError::Manifest("missing width".into()))?;
	let h = parts.next().ok_or_else(|| CompositeError::Manifest("missing height".into()))?;
	if parts.next().is_some() {
		return Err(CompositeError::Manifest(format!("malformed dimensions line: {}", header)));
	}
	let width: usize = w
		.trim()
		.parse()
		.map_err(|_| CompositeError::Manifest(format!("non-numeric width: {}", w)))?;
	let height: usize = h
		.trim()
		.parse()
		.map_err(|_| CompositeError::Manifest(format!("non-numeric height: {}", h)))?;
	if width == 0 || height == 0 {
		return Err(CompositeError::Manifest("canvas dimensions must be positive".into()));
	}
	Ok((width, height))
}

fn parse_layer_line(line: &str) -> Result<LayerSpec, CompositeError> {
	let fields: Vec<&str> = line.split(',').map(str::trim).collect();
	let (image_path, mask_path, rest) = match fields.as_slice() {
		[image, ox, oy] => (*image, None, [*ox, *oy]),
		[image, mask, ox, oy] => (*image, Some(*mask), [*ox, *oy]),
		_ => return Err(CompositeError::Manifest(format!("malformed layer line: {}", line))),
	};
	let offset_x: isize = rest[0]
		.parse()
		.map_err(|_| CompositeError::Manifest(format!("non-numeric offset_x: {}", rest[0])))?;
	let offset_y: isize = rest[1]
		.parse()
		.map_err(|_| CompositeError::Manifest(format!("non-numeric offset_y: {}", rest[1])))?;

	Ok(LayerSpec {
		image_path: image_path.to_string(),
		mask_path: mask_path.map(str::to_string),
		offset_x,
		offset_y,
	})
}

/// Loads every layer referenced by `manifest`, resolving relative image and
/// mask paths against `base_dir` (normally the manifest's own directory).
pub fn load_layers(manifest: &Manifest, base_dir: &Path) -> Result<Vec<Layer>, CompositeError> {
	let mut layers = Vec::with_capacity(manifest.layers.len());
	for spec in &manifest.layers {
		info!("loading layer: {}", spec.image_path);
		let image_grid = load_rgb(&resolve(base_dir, &spec.image_path))?;
		let layer = match &spec.mask_path {
			Some(mask_path) => {
				let mask_luma = load_luma(&resolve(base_dir, mask_path))?;
				let mask = Layer::threshold_mask(&mask_luma);
				Layer::new(image_grid, mask, spec.offset_x, spec.offset_y)?
			}
			None => Layer::new_opaque(image_grid, spec.offset_x, spec.offset_y),
		};
		layers.push(layer);
	}
	Ok(layers)
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
	let p = Path::new(path);
	if p.is_absolute() {
		p.to_path_buf()
	} else {
		base_dir.join(p)
	}
}

fn load_rgb(path: &Path) -> Result<PixelGrid, CompositeError> {
	let img = image::open(path)?.into_rgb();
	let (width, height) = img.dimensions();
	Ok(PixelGrid::from_vec(height as usize, width as usize, 3, img.into_raw()))
}

fn load_luma(path: &Path) -> Result<PixelGrid, CompositeError> {
	let img = image::open(path)?.into_luma();
	let (width, height) = img.dimensions();
	Ok(PixelGrid::from_vec(height as usize, width as usize, 1, img.into_raw()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_header_and_layer_lines() {
		let text = "640x480\nbg.png,0,0\nfg.png,fg_mask.png,10,20\n";
		let manifest = parse_manifest(text).unwrap();
		assert_eq!(manifest.width, 640);
		assert_eq!(manifest.height, 480);
		assert_eq!(
			manifest.layers[0],
			LayerSpec { image_path: "bg.png".into(), mask_path: None, offset_x: 0, offset_y: 0 }
		);
		assert_eq!(
			manifest.layers[1],
			LayerSpec {
				image_path: "fg.png".into(),
				mask_path: Some("fg_mask.png".into()),
				offset_x: 10,
				offset_y: 20,
			}
		);
	}

	#[test]
	fn ignores_blank_lines_and_comments() {
		let text = "# canvas size\n4x4\n\n# background\nbg.png,0,0\n";
		let manifest = parse_manifest(text).unwrap();
		assert_eq!(manifest.layers.len(), 1);
	}

	#[test]
	fn rejects_empty_manifest() {
		assert!(matches!(parse_manifest(""), Err(CompositeError::Manifest(_))));
	}

	#[test]
	fn rejects_manifest_with_no_layers() {
		assert!(matches!(parse_manifest("4x4\n"), Err(CompositeError::Manifest(_))));
	}

	#[test]
	fn rejects_malformed_dimensions() {
		assert!(matches!(parse_manifest("4x4x4\nbg.png,0,0\n"), Err(CompositeError::Manifest(_))));
	}

	#[test]
	fn rejects_malformed_layer_line() {
		assert!(matches!(parse_manifest("4x4\nbg.png\n"), Err(CompositeError::Manifest(_))));
	}
}
