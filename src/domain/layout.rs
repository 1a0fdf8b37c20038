use std::path::Path;

use crate::domain::aggregate::MonthlyAggregate;
use crate::domain::models::SessionRecord;
use crate::domain::rates::RateTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

pub const BRAND_GREEN: Rgb = Rgb::new(0x68, 0xB3, 0x00);
pub const ROW_SHADE: Rgb = Rgb::new(0xDF, 0xF0, 0xD8);
pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);
pub const BLACK: Rgb = Rgb::new(0x00, 0x00, 0x00);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub weight: FontWeight,
    pub size: f32,
    pub color: Rgb,
}

impl TextStyle {
    const fn new(weight: FontWeight, size: f32, color: Rgb) -> Self {
        Self {
            weight,
            size,
            color,
        }
    }
}

const TITLE: TextStyle = TextStyle::new(FontWeight::Bold, 18.0, BRAND_GREEN);
const SUBTITLE: TextStyle = TextStyle::new(FontWeight::Regular, 12.0, BLACK);
const HEADER: TextStyle = TextStyle::new(FontWeight::Bold, 10.0, WHITE);
const CELL: TextStyle = TextStyle::new(FontWeight::Regular, 9.0, BLACK);
const SUMMARY_HEADING: TextStyle = TextStyle::new(FontWeight::Bold, 12.0, BRAND_GREEN);
const SUMMARY_LINE: TextStyle = TextStyle::new(FontWeight::Regular, 10.0, BLACK);

/// Drawing primitives used by the layout engine. Coordinates are points with
/// the origin at the bottom-left corner of the page.
pub trait ReportCanvas {
    type Error;

    fn draw_text(&mut self, x: f32, y: f32, text: &str, style: TextStyle);
    fn draw_filled_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb);
    fn new_page(&mut self);
    fn save(self, path: &Path) -> Result<(), Self::Error>
    where
        Self: Sized;
}

pub const COLUMN_HEADERS: [&str; 8] = [
    "Datum",
    "Verbunden",
    "Getrennt",
    "User ID",
    "Kennzeichen",
    "Dauer (Std)",
    "Energie (kWh)",
    "Kosten (EUR)",
];

const CM: f32 = 72.0 / 2.54;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub left: f32,
    pub title_y: f32,
    pub subtitle_y: f32,
    pub table_top: f32,
    pub first_row_offset: f32,
    pub row_height: f32,
    pub bottom_margin: f32,
    pub cell_inset: f32,
    pub column_widths: [f32; 8],
    pub summary_gap: f32,
    pub summary_line_spacing: f32,
}

impl Default for LayoutGeometry {
    /// Landscape A4.
    fn default() -> Self {
        Self {
            page_width: 841.89,
            page_height: 595.28,
            left: 2.0 * CM,
            title_y: 19.0 * CM,
            subtitle_y: 18.0 * CM,
            table_top: 17.0 * CM,
            first_row_offset: 20.0,
            row_height: 14.0,
            bottom_margin: 2.0 * CM,
            cell_inset: 5.0,
            column_widths: [65.0, 95.0, 95.0, 75.0, 80.0, 70.0, 80.0, 75.0],
            summary_gap: 20.0,
            summary_line_spacing: 20.0,
        }
    }
}

impl LayoutGeometry {
    pub fn table_width(&self) -> f32 {
        self.column_widths.iter().sum()
    }

    fn column_x(&self, column: usize) -> f32 {
        self.left + self.column_widths[..column].iter().sum::<f32>()
    }

    fn first_row_y(&self) -> f32 {
        self.table_top - self.first_row_offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutSummary {
    pub pages: usize,
    pub rows: usize,
}

/// Position of the layout state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageCursor {
    page: usize,
    y: f32,
}

impl PageCursor {
    fn start_page<C: ReportCanvas>(&mut self, canvas: &mut C, y: f32) {
        canvas.new_page();
        self.page += 1;
        self.y = y;
    }
}

pub fn format_row(session: &SessionRecord) -> [String; 8] {
    [
        session.disconnected_at.format("%d.%m.%Y").to_string(),
        session.connected_at.format("%Y-%m-%d %H:%M").to_string(),
        session.disconnected_at.format("%Y-%m-%d %H:%M").to_string(),
        session.user_id.clone(),
        session.plate.clone(),
        format!("{:.2}", session.duration_hours),
        format!("{:.2}", session.energy_kwh),
        format!("{:.2}", session.cost_eur),
    ]
}

/// Lays out the monthly report onto `canvas`, starting on its current page.
pub fn layout_report<C: ReportCanvas>(
    canvas: &mut C,
    aggregate: &MonthlyAggregate,
    identity: &str,
    rates: &RateTable,
    geometry: &LayoutGeometry,
) -> LayoutSummary {
    let period = aggregate.period;
    canvas.draw_text(
        geometry.left,
        geometry.title_y,
        &format!("Wallbox Ladekosten - {identity} - {period}"),
        TITLE,
    );
    canvas.draw_text(
        geometry.left,
        geometry.subtitle_y,
        &format!(
            "Kostenersatz {}: {}",
            period.year(),
            rates.describe(period.year())
        ),
        SUBTITLE,
    );

    draw_header_band(canvas, geometry);
    let mut cursor = PageCursor {
        page: 1,
        y: geometry.first_row_y(),
    };

    for (index, session) in aggregate.sessions.iter().enumerate() {
        if cursor.y < geometry.bottom_margin {
            cursor.start_page(canvas, geometry.first_row_y());
            draw_header_band(canvas, geometry);
        }
        draw_row(canvas, geometry, index, session, cursor.y);
        cursor.y -= geometry.row_height;
    }

    cursor.y -= geometry.summary_gap;
    let summary_height = 3.0 * geometry.summary_line_spacing;
    if cursor.y - summary_height < geometry.bottom_margin {
        cursor.start_page(canvas, geometry.table_top);
    }
    draw_summary(canvas, geometry, aggregate, cursor.y);

    LayoutSummary {
        pages: cursor.page,
        rows: aggregate.sessions.len(),
    }
}

fn draw_header_band<C: ReportCanvas>(canvas: &mut C, geometry: &LayoutGeometry) {
    let y = geometry.table_top;
    canvas.draw_filled_rect(
        geometry.left,
        y - 10.0,
        geometry.table_width(),
        15.0,
        BRAND_GREEN,
    );
    for (column, header) in COLUMN_HEADERS.iter().enumerate() {
        canvas.draw_text(
            geometry.column_x(column) + geometry.cell_inset,
            y - 5.0,
            header,
            HEADER,
        );
    }
}

fn draw_row<C: ReportCanvas>(
    canvas: &mut C,
    geometry: &LayoutGeometry,
    index: usize,
    session: &SessionRecord,
    y: f32,
) {
    let background = if index % 2 == 0 { ROW_SHADE } else { WHITE };
    canvas.draw_filled_rect(
        geometry.left,
        y - 5.0,
        geometry.table_width(),
        geometry.row_height,
        background,
    );
    for (column, value) in format_row(session).iter().enumerate() {
        canvas.draw_text(
            geometry.column_x(column) + geometry.cell_inset,
            y,
            value,
            CELL,
        );
    }
}

fn draw_summary<C: ReportCanvas>(
    canvas: &mut C,
    geometry: &LayoutGeometry,
    aggregate: &MonthlyAggregate,
    y: f32,
) {
    let step = geometry.summary_line_spacing;
    canvas.draw_text(geometry.left, y, "Monatssummen:", SUMMARY_HEADING);
    canvas.draw_text(
        geometry.left,
        y - step,
        &format!("Gesamtdauer: {:.2} Std", aggregate.total_duration_hours),
        SUMMARY_LINE,
    );
    canvas.draw_text(
        geometry.left,
        y - 2.0 * step,
        &format!("Lademenge: {:.2} kWh", aggregate.total_energy_kwh),
        SUMMARY_LINE,
    );
    canvas.draw_text(
        geometry.left,
        y - 3.0 * step,
        &format!("Kostenersatz: {:.2} EUR", aggregate.total_cost_eur),
        SUMMARY_LINE,
    );
}
