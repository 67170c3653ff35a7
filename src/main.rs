use std::fs;
use std::path::Path;

use gradient_composite::config::CompositorConfig;
use gradient_composite::error::CompositeError;
use gradient_composite::manifest::{load_layers, parse_manifest};
use gradient_composite::Compositor;

/// Helper function for `main`.
fn error_exit(msg: &str, code: i32) -> ! {
	eprintln!("{}", msg);
	std::process::exit(code)
}

/// `clap`-based CLI that reads a layer manifest and writes a seamlessly
/// blended composite.
///
/// May exit process with status code if there are errors:
///
/// 1: `clap` error
///
/// 2: invalid arguments
///
/// 3: file I/O issues
///
/// 4: invalid manifest or image data
///
/// 5: solver did not converge, or the system was singular
///
/// 10: other, potentially unknown error
fn main() {
	env_logger::init();

	let clap_matches = clap::App::new("gradient_composite")
		.version("0.1.0")
		.author("vkcz")
		.about("Seamlessly composites layered images via gradient-domain Poisson blending.")
		.arg_from_usage("<MANIFEST> 'Path to the layer manifest'")
		.arg_from_usage("<OUTPUT> 'Path to the output image'")
		.arg_from_usage("--full-keypoints 'Solve one unknown per pixel instead of the quadtree-reduced system'")
		.arg_from_usage("-t, --tolerance=[N] 'Conjugate Gradient relative residual tolerance; defaults to 1e-6'")
		.arg_from_usage("-i, --max-iterations=[N] 'Conjugate Gradient iteration cap; defaults to 1000'")
		.arg_from_usage("--emit-mixed=[PATH] 'Also write the pre-blend mixed image to PATH'")
		.arg_from_usage("--emit-delta=[PATH] 'Also write the correction-field visualization to PATH'")
		.arg_from_usage("--emit-quadtree=[PATH] 'Also write the quadtree-leaf visualization to PATH'")
		.get_matches();

	let manifest_path = clap_matches.value_of("MANIFEST").unwrap();
	let output_path = clap_matches.value_of("OUTPUT").unwrap();

	let mut config = CompositorConfig::default();
	config.full_keypoints = clap_matches.is_present("full-keypoints");
	if let Some(v) = clap_matches.value_of("tolerance") {
		config.cg_tolerance = match v.parse() {
			Ok(n) => n,
			Err(_) => error_exit("Non-numeric value for tolerance", 2),
		};
	}
	if let Some(v) = clap_matches.value_of("max-iterations") {
		config.cg_max_iterations = match v.parse() {
			Ok(n) => n,
			Err(_) => error_exit("Non-numeric value for max-iterations", 2),
		};
	}
	config.emit_mixed = clap_matches.value_of("emit-mixed").is_some();
	config.emit_delta = clap_matches.value_of("emit-delta").is_some();
	config.emit_quadtree = clap_matches.value_of("emit-quadtree").is_some();

	let manifest_text = match fs::read_to_string(manifest_path) {
		Ok(t) => t,
		Err(_) => error_exit("Manifest file not found or could not be read", 3),
	};
	let manifest = match parse_manifest(&manifest_text) {
		Ok(m) => m,
		Err(e) => error_exit(&format!("{}", e), 4),
	};

	let base_dir = Path::new(manifest_path).parent().unwrap_or_else(|| Path::new("."));
	let layers = match load_layers(&manifest, base_dir) {
		Ok(l) => l,
		Err(e) => match e {
			CompositeError::Io(_) => error_exit(&format!("{}", e), 3),
			_ => error_exit(&format!("{}", e), 4),
		},
	};

	let mut compositor = match Compositor::new(manifest.width, manifest.height) {
		Ok(c) => c,
		Err(e) => error_exit(&format!("{}", e), 2),
	};
	for layer in layers {
		compositor.add_layer(layer);
	}

	let result = match compositor.run(&config) {
		Ok(r) => r,
		Err(e) => match e {
			CompositeError::SolverNonConvergence { .. } | CompositeError::SingularSystem => {
				error_exit(&format!("{}", e), 5)
			}
			_ => error_exit(&format!("{}", e), 10),
		},
	};

	if let Err(e) = save_grid(&result.output, output_path) {
		error_exit(&format!("{}", e), 3);
	}
	if let (true, Some(path)) = (config.emit_mixed, clap_matches.value_of("emit-mixed")) {
		if let Some(grid) = &result.mixed {
			if let Err(e) = save_grid(grid, path) {
				error_exit(&format!("{}", e), 3);
			}
		}
	}
	if let (true, Some(path)) = (config.emit_delta, clap_matches.value_of("emit-delta")) {
		if let Some(grid) = &result.delta {
			if let Err(e) = save_grid(grid, path) {
				error_exit(&format!("{}", e), 3);
			}
		}
	}
	if let (true, Some(path)) = (config.emit_quadtree, clap_matches.value_of("emit-quadtree")) {
		if let Some(grid) = &result.quadtree {
			if let Err(e) = save_grid(grid, path) {
				error_exit(&format!("{}", e), 3);
			}
		}
	}
}

fn save_grid(grid: &gradient_composite::grid::PixelGrid, path: &str) -> Result<(), CompositeError> {
	let buf = image::RgbImage::from_raw(grid.width() as u32, grid.height() as u32, grid.as_slice().to_vec())
		.expect("pixel grid buffer length must match its declared dimensions");
	buf.save(path)?;
	Ok(())
}
