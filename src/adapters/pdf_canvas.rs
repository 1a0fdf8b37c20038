use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Pt, Rect,
};
use thiserror::Error;

use crate::domain::layout::{FontWeight, LayoutGeometry, ReportCanvas, Rgb, TextStyle};

const LAYER_NAME: &str = "Report";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pdf generation failed: {0}")]
    Pdf(#[from] printpdf::Error),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// PDF document whose pages all share the size of the layout geometry.
pub struct PdfCanvas {
    document: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    width: Mm,
    height: Mm,
}

impl PdfCanvas {
    pub fn new(title: &str, geometry: &LayoutGeometry) -> Result<Self, RenderError> {
        let width = Mm::from(Pt(geometry.page_width));
        let height = Mm::from(Pt(geometry.page_height));
        let (document, page, layer) = PdfDocument::new(title, width, height, LAYER_NAME);
        let regular = document.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = document.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let layer = document.get_page(page).get_layer(layer);

        Ok(Self {
            document,
            layer,
            regular,
            bold,
            width,
            height,
        })
    }
}

fn to_color(color: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        f32::from(color.r) / 255.0,
        f32::from(color.g) / 255.0,
        f32::from(color.b) / 255.0,
        None,
    ))
}

fn mm(points: f32) -> Mm {
    Mm::from(Pt(points))
}

impl ReportCanvas for PdfCanvas {
    type Error = RenderError;

    fn draw_text(&mut self, x: f32, y: f32, text: &str, style: TextStyle) {
        let font = match style.weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        };
        self.layer.set_fill_color(to_color(style.color));
        self.layer.use_text(text, style.size, mm(x), mm(y), font);
    }

    fn draw_filled_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        self.layer.set_fill_color(to_color(color));
        self.layer
            .add_rect(Rect::new(mm(x), mm(y), mm(x + width), mm(y + height)));
    }

    fn new_page(&mut self) {
        let (page, layer) = self.document.add_page(self.width, self.height, LAYER_NAME);
        self.layer = self.document.get_page(page).get_layer(layer);
    }

    fn save(self, path: &Path) -> Result<(), Self::Error> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.document.save(&mut writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::layout::{
        BLACK, FontWeight, LayoutGeometry, ROW_SHADE, ReportCanvas, TextStyle,
    };

    use super::PdfCanvas;

    #[test]
    fn writes_multi_page_pdf() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("report.pdf");
        let style = TextStyle {
            weight: FontWeight::Regular,
            size: 10.0,
            color: BLACK,
        };

        let mut canvas =
            PdfCanvas::new("test", &LayoutGeometry::default()).expect("canvas should build");
        canvas.draw_filled_rect(50.0, 400.0, 200.0, 14.0, ROW_SHADE);
        canvas.draw_text(55.0, 405.0, "Seite 1", style);
        canvas.new_page();
        canvas.draw_text(55.0, 405.0, "Seite 2", style);
        canvas.save(&path).expect("pdf should be written");

        let bytes = std::fs::read(&path).expect("pdf should be readable");
        assert!(bytes.starts_with(b"%PDF"));
    }
}
