/*!
 * Pie chart icons for clusters.
 *
 * The icon shows the population of a cluster as a number on a white disc, surrounded by a ring of
 * pie slices, one per category present, sized by that category's share of the population. Slices
 * always follow the category registry order, so two clusters with the same stats look the same no
 * matter what order their records were loaded in.
 *
 * Rendering is a pure function of the stats and the configuration, which makes it safe to cache
 * icons by their stats.
 */
use crate::{
    category::{CategoryId, CategoryRegistry},
    config::{IconStyle, MapConfig},
};
use rustc_hash::FxHashMap;
use std::{f64::consts::TAU, fmt::Write, rc::Rc};

/// One colored wedge of the pie.
#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub category: CategoryId,
    pub color: String,
    /// Start angle in radians, measured clockwise from the positive x axis (screen coordinates).
    pub start: f64,
    /// End angle in radians.
    pub end: f64,
    /// Draw a separating stroke around the slice.
    pub stroked: bool,
}

impl PieSlice {
    /// Does the slice cover the whole circle?
    pub fn is_full(&self) -> bool {
        self.end - self.start >= TAU - 1.0e-9
    }
}

/// Everything needed to draw a cluster icon.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterIcon {
    /// Edge length of the square icon.
    pub size: f64,
    /// Outer radius of the pie.
    pub radius: f64,
    /// Slices in category order.
    pub slices: Vec<PieSlice>,
    /// Stroke the outline of the whole pie, used when there is only one category.
    pub outline: bool,
    pub center_radius: f64,
    pub center_color: String,
    pub stroke_color: String,
    /// The population as text.
    pub label: String,
    pub font_size: f64,
    pub text_color: String,
}

impl ClusterIcon {
    /// Render as a standalone SVG document.
    pub fn to_svg(&self) -> String {
        let c = self.size / 2.0;
        let mut svg = String::with_capacity(512);

        let _ = writeln!(
            &mut svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{s}" height="{s}" viewBox="0 0 {s} {s}">"#,
            s = fmt_num(self.size)
        );

        for slice in &self.slices {
            let stroke = if slice.stroked {
                format!(r#" stroke="{}" stroke-width="0.5""#, self.stroke_color)
            } else {
                String::new()
            };

            if slice.is_full() {
                let _ = writeln!(
                    &mut svg,
                    r#"<circle cx="{c}" cy="{c}" r="{r}" fill="{fill}"{stroke}/>"#,
                    c = fmt_num(c),
                    r = fmt_num(self.radius),
                    fill = slice.color,
                    stroke = stroke
                );
                continue;
            }

            let (x1, y1) = polar(c, self.radius, slice.start);
            let (x2, y2) = polar(c, self.radius, slice.end);
            let large_arc = if slice.end - slice.start > std::f64::consts::PI {
                1
            } else {
                0
            };

            let _ = writeln!(
                &mut svg,
                r#"<path d="M{c},{c} L{x1},{y1} A{r},{r} 0 {large_arc} 1 {x2},{y2} Z" fill="{fill}"{stroke}/>"#,
                c = fmt_num(c),
                x1 = fmt_num(x1),
                y1 = fmt_num(y1),
                r = fmt_num(self.radius),
                large_arc = large_arc,
                x2 = fmt_num(x2),
                y2 = fmt_num(y2),
                fill = slice.color,
                stroke = stroke
            );
        }

        if self.outline {
            let _ = writeln!(
                &mut svg,
                r#"<circle cx="{c}" cy="{c}" r="{r}" fill="none" stroke="{stroke}" stroke-width="0.5"/>"#,
                c = fmt_num(c),
                r = fmt_num(self.radius),
                stroke = self.stroke_color
            );
        }

        let _ = writeln!(
            &mut svg,
            r#"<circle cx="{c}" cy="{c}" r="{r}" fill="{fill}"/>"#,
            c = fmt_num(c),
            r = fmt_num(self.center_radius),
            fill = self.center_color
        );

        let _ = writeln!(
            &mut svg,
            concat!(
                r#"<text x="{c}" y="{c}" text-anchor="middle" dominant-baseline="central" "#,
                r#"font-family="sans-serif" font-weight="bold" font-size="{font}" fill="{fill}">{label}</text>"#
            ),
            c = fmt_num(c),
            font = fmt_num(self.font_size),
            fill = self.text_color,
            label = self.label
        );

        svg.push_str("</svg>\n");
        svg
    }
}

fn polar(center: f64, radius: f64, angle: f64) -> (f64, f64) {
    (
        center + radius * f64::cos(angle),
        center + radius * f64::sin(angle),
    )
}

/// Format with at most 3 decimals and no trailing zeros.
fn fmt_num(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_owned()
    } else {
        s.to_owned()
    }
}

/// Pie radius for a population.
///
/// Linear between `(min_population, min_radius)` and `(max_population, max_radius)`, clamped to
/// that radius range outside of it.
pub fn pie_radius(population: u32, style: &IconStyle) -> f64 {
    let xa = style.min_population as f64;
    let xb = style.max_population as f64;
    let ya = style.min_radius;
    let yb = style.max_radius;

    let r = ya + (population as f64 - xa) * ((yb - ya) / (xb - xa));
    r.clamp(ya, yb)
}

/// Font size for the population label, smaller as the number gets more digits.
pub fn label_font_size(population: u32, style: &IconStyle) -> f64 {
    style
        .font_steps
        .iter()
        .find(|(limit, _)| population < *limit)
        .map(|(_, size)| *size)
        .unwrap_or(style.min_font)
}

/// Lay out the pie for a cluster.
///
/// `stats` holds a count per category index and `population` should be their sum.
pub fn render_pie(
    stats: &[u32],
    population: u32,
    categories: &CategoryRegistry,
    style: &IconStyle,
) -> ClusterIcon {
    let mut slices = vec![];
    let mut start = 0.0;
    let mut outline = false;

    if population > 0 {
        for (id, category) in categories.iter() {
            let count = stats.get(id.index()).copied().unwrap_or(0);
            if count == 0 {
                continue;
            }

            let share = count as f64 / population as f64;
            let single = count >= population;
            let end = start + share * TAU;

            // Leave a gap before every slice of a mixed pie, unless the slice is too thin to
            // have one.
            let mut from = start + style.slice_gap;
            if end < from || single {
                from = start;
            }

            slices.push(PieSlice {
                category: id,
                color: category.color.clone(),
                start: from,
                end,
                stroked: !single,
            });

            outline = single;
            start = end;
        }
    }

    ClusterIcon {
        size: style.size,
        radius: pie_radius(population, style),
        slices,
        outline,
        center_radius: style.center_radius,
        center_color: style.center_color.clone(),
        stroke_color: style.stroke_color.clone(),
        label: population.to_string(),
        font_size: label_font_size(population, style),
        text_color: style.text_color.clone(),
    }
}

/// Makes the icon for a cluster. Swap in a different implementation to change how clusters look.
pub trait IconBuilder {
    fn build(&self, stats: &[u32], population: u32, config: &MapConfig) -> ClusterIcon;
}

/// The default pie chart icon.
#[derive(Debug, Clone, Copy, Default)]
pub struct PieIconBuilder;

impl IconBuilder for PieIconBuilder {
    fn build(&self, stats: &[u32], population: u32, config: &MapConfig) -> ClusterIcon {
        render_pie(stats, population, &config.categories, &config.icon)
    }
}

/// Reuse icons for clusters with identical stats.
#[derive(Debug, Default)]
pub struct IconCache {
    icons: FxHashMap<(Vec<u32>, u32), Rc<ClusterIcon>>,
}

impl IconCache {
    pub fn get_or_build(
        &mut self,
        stats: &[u32],
        population: u32,
        builder: &dyn IconBuilder,
        config: &MapConfig,
    ) -> Rc<ClusterIcon> {
        let key = (stats.to_vec(), population);
        self.icons
            .entry(key)
            .or_insert_with(|| Rc::new(builder.build(stats, population, config)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    pub fn clear(&mut self) {
        self.icons.clear();
    }
}
