use image::{ImageReader, Luma};
use nuchal::{NtMeasurer, PixelCalibration, ProbabilityMap, SegmentationConfig};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: {} <probability_map.png> [pixel_size_mm] [out.json]",
            args[0]
        );
        std::process::exit(2);
    }

    // 8-bit map: 0..255 → 0..1, measured at its own resolution.
    let gray = ImageReader::open(&args[1])?.decode()?.to_luma8();
    let probs = ProbabilityMap::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([f32::from(gray.get_pixel(x, y)[0]) / 255.0])
    });
    let calibration = match args.get(2) {
        Some(mm) => PixelCalibration::new(mm.parse()?)?,
        None => PixelCalibration::default(),
    };

    let measurer = NtMeasurer::new(SegmentationConfig::default());
    let result = measurer.measure_probabilities(&probs, [gray.width(), gray.height()]);

    match (&result.ellipse, result.measurement(&calibration)) {
        (Some(e), Some(m)) => {
            println!(
                "Ellipse at ({:.1}, {:.1}), axes {:.1}/{:.1} px, angle {:.1} deg",
                e.center_x, e.center_y, e.major_axis, e.minor_axis, e.angle
            );
            println!("NT: {:.2} px = {:.2} mm", m.distance_px, m.distance_mm);
        }
        _ => println!("No foreground; no measurement."),
    }

    if let Some(out_path) = args.get(3) {
        let json = serde_json::to_string_pretty(&result.to_prediction())?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
