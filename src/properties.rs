//! Diagnostic properties of the particle field, e.g. radial density profiles.

use lin_alg::f64::Vec3;
use plotters::{
    element::PathElement,
    prelude::{BitMapBackend, ChartBuilder, Color, IntoDrawingArea, BLACK, BLUE, WHITE},
    series::LineSeries,
};

use crate::Particle;

const N_SAMPLE_PTS: usize = 40;

fn centroid(particles: &[Particle]) -> Vec3 {
    let mut sum = Vec3::new_zero();
    for p in particles {
        sum += p.posit;
    }
    sum / particles.len() as f64
}

/// Normalized density profile around the fluid centroid.
/// X: r from centroid. Y: mean ρ/ρ₀ of particles in the shell at that r.
pub fn density_profile(particles: &[Particle], rest_density: f64) -> Vec<(f64, f64)> {
    let mut result = Vec::with_capacity(N_SAMPLE_PTS);

    if particles.is_empty() {
        return result;
    }

    let center = centroid(particles);
    let r_max = particles
        .iter()
        .map(|p| (p.posit - center).magnitude())
        .fold(0., f64::max);

    let dr = r_max / N_SAMPLE_PTS as f64;

    for i in 0..N_SAMPLE_PTS {
        let r = i as f64 * dr;

        let shell: Vec<f64> = particles
            .iter()
            .filter(|p| ((p.posit - center).magnitude() - r).abs() <= dr / 2.)
            .map(|p| p.density)
            .collect();

        if shell.is_empty() {
            result.push((r, 0.));
        } else {
            let mean = shell.iter().sum::<f64>() / shell.len() as f64;
            result.push((r, mean / rest_density));
        }
    }

    result
}

/// Display a 2d plot of a property, written to a PNG next to the binary.
pub fn plot(data: &[(f64, f64)], x_label: &str, y_label: &str, plot_title: &str, filename: &str) {
    let x_range = data
        .iter()
        .map(|(x, _)| *x)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), x| {
            (min.min(x), max.max(x))
        });

    let y_range = data
        .iter()
        .map(|(_, y)| *y)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), y| {
            (min.min(y), max.max(y))
        });

    let fname = format!("{filename}.png");
    let root = BitMapBackend::new(&fname, (800, 600)).into_drawing_area();
    root.fill(&WHITE).unwrap();

    let mut chart = ChartBuilder::on(&root)
        .caption(plot_title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
        .unwrap();

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()
        .unwrap();

    chart
        .draw_series(LineSeries::new(data.iter().cloned(), BLUE))
        .unwrap()
        .label("Data")
        .legend(|(x, y)| PathElement::new([(x, y), (x + 20, y)], BLUE));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .unwrap();
}

pub fn plot_density_profile(data: &[(f64, f64)], desc: &str) {
    plot(
        data,
        "r",
        "ρ / ρ₀",
        &format!("Normalized density profile: {desc}"),
        &format!("density_plot_{desc}"),
    );
}
