//! In-memory document tree for the declarative backend.
//!
//! Pages hold sections (one per region), sections stack rows and text,
//! rows split their width between columns. Styling is attached per node;
//! nothing here knows about PDF.

use crate::crew::{
    CrewColumnKind, CrewRow, CrewTable, CrewTablePolicy, CREW_COLUMNS, DEPTH_NO, DEPTH_YES,
};
use crate::form::{self, Field, FieldValue};
use crate::geometry::{LayoutGeometry, PagePlan, Region, RegionHeight};
use crate::model::CheckPair;
use crate::render::RenderContext;
use crate::signature::{self, SignatureBlock};
use ::image::{GrayImage, RgbImage};
use std::sync::Arc;

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_pt: f32,
    pub bold: bool,
    pub align: Align,
    pub indent_mm: f32,
}

impl TextStyle {
    pub fn regular(size_pt: f32) -> Self {
        Self {
            size_pt,
            bold: false,
            align: Align::Left,
            indent_mm: 0.0,
        }
    }

    pub fn bold(size_pt: f32) -> Self {
        Self {
            bold: true,
            ..Self::regular(size_pt)
        }
    }

    fn aligned(self, align: Align) -> Self {
        Self { align, ..self }
    }

    fn indented(self, indent_mm: f32) -> Self {
        Self { indent_mm, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxStyle {
    pub border: bool,
    /// Gray level of the background, `None` for transparent.
    pub fill: Option<f32>,
    pub padding_mm: f32,
    pub min_height_mm: f32,
    /// Horizontal rule under the box.
    pub rule_below: bool,
}

#[derive(Debug, Clone)]
pub enum ImageData {
    Rgb(Arc<RgbImage>),
    Gray(Arc<GrayImage>),
}

impl ImageData {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ImageData::Rgb(img) => img.dimensions(),
            ImageData::Gray(img) => img.dimensions(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Section {
        region: Region,
        height: RegionHeight,
        /// Placed against the bottom margin instead of the cursor.
        pin_bottom: bool,
        style: BoxStyle,
        children: Vec<Node>,
    },
    Row {
        style: BoxStyle,
        children: Vec<Node>,
    },
    Column {
        width_ratio: f32,
        style: BoxStyle,
        children: Vec<Node>,
    },
    Text {
        content: String,
        style: TextStyle,
    },
    Image {
        data: ImageData,
        max_width_mm: f32,
        max_height_mm: f32,
        align: Align,
    },
    Checkbox {
        /// Name recorded in the page summary.
        key: String,
        checked: bool,
        label: String,
        size_pt: f32,
    },
    Rule,
    Spacer {
        height_mm: f32,
    },
}

#[derive(Debug, Clone)]
pub struct PageNode {
    pub plan: PagePlan,
    pub sections: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct DocumentTree {
    pub geometry: LayoutGeometry,
    pub pages: Vec<PageNode>,
}

// ============================================================================
// Builder
// ============================================================================

pub fn build_document(ctx: &RenderContext<'_>) -> DocumentTree {
    let geometry = ctx.geometry;
    let table = ctx.crew_table();
    let pages = geometry
        .page_plans()
        .into_iter()
        .map(|plan| {
            let sections = plan
                .regions
                .iter()
                .map(|region| build_section(ctx, &plan, &table, *region))
                .collect();
            PageNode { plan, sections }
        })
        .collect();

    DocumentTree { geometry, pages }
}

fn build_section(
    ctx: &RenderContext<'_>,
    plan: &PagePlan,
    table: &CrewTable,
    region: Region,
) -> Node {
    let geometry = ctx.geometry;
    let height = geometry.region_height(region, plan.crew_rows.len());
    let mut style = BoxStyle::default();

    let children = match region {
        Region::Header => {
            style.rule_below = true;
            header(ctx, plan)
        }
        Region::MetaBox => {
            let fields = form::meta_fields(ctx.view);
            vec![field_row(&geometry, &fields, height.base())]
        }
        Region::GeneralData => {
            let mut rows = vec![title_bar(&geometry, Region::GeneralData.title())];
            let row_h = geometry.metrics().field_row_mm;
            for row in form::general_rows(ctx.view) {
                rows.push(field_row(&geometry, &row, row_h));
            }
            rows
        }
        Region::CrewTable => crew_table(&geometry, table, plan),
        Region::DiverNarratives => {
            style.border = true;
            narratives(ctx)
        }
        Region::Observations => {
            style.border = true;
            let m = geometry.metrics();
            vec![
                title_bar(&geometry, Region::Observations.title()),
                Node::Text {
                    content: ctx.view.observations.clone(),
                    style: TextStyle::regular(m.value_pt).indented(2.0),
                },
            ]
        }
        Region::Signatures => vec![signatures(ctx, height.base())],
        Region::Footer => footer(ctx, plan),
    };

    Node::Section {
        region,
        height,
        pin_bottom: region == Region::Footer,
        style,
        children,
    }
}

fn column(width_ratio: f32, style: BoxStyle, children: Vec<Node>) -> Node {
    Node::Column {
        width_ratio,
        style,
        children,
    }
}

/// A borderless column holding a single node.
fn plain(width_ratio: f32, child: Node) -> Node {
    column(width_ratio, BoxStyle::default(), vec![child])
}

fn split(children: Vec<Node>) -> Node {
    Node::Row {
        style: BoxStyle::default(),
        children,
    }
}

fn text(content: impl Into<String>, style: TextStyle) -> Node {
    Node::Text {
        content: content.into(),
        style,
    }
}

fn cell_style(min_height_mm: f32) -> BoxStyle {
    BoxStyle {
        border: true,
        padding_mm: 1.0,
        min_height_mm,
        ..BoxStyle::default()
    }
}

fn title_bar(geometry: &LayoutGeometry, title: &str) -> Node {
    let m = geometry.metrics();
    Node::Row {
        style: BoxStyle {
            border: true,
            fill: Some(0.88),
            padding_mm: 1.2,
            min_height_mm: m.section_title_mm,
            rule_below: false,
        },
        children: vec![plain(1.0, text(title, TextStyle::bold(m.section_pt)))],
    }
}

fn header(ctx: &RenderContext<'_>, plan: &PagePlan) -> Vec<Node> {
    let m = ctx.geometry.metrics();
    let [title, subtitle, folio] = form::header_lines(ctx.view, plan);
    let titles = vec![
        text(title, TextStyle::bold(m.title_pt)),
        text(subtitle, TextStyle::regular(m.small_pt + 1.0)),
    ];
    let folio = text(folio, TextStyle::bold(m.value_pt).aligned(Align::Right));
    vec![split(vec![
        column(0.65, BoxStyle::default(), titles),
        plain(0.35, folio),
    ])]
}

fn field_row(geometry: &LayoutGeometry, fields: &[Field], min_height: f32) -> Node {
    let m = geometry.metrics();
    let style = cell_style(min_height);
    let children = fields
        .iter()
        .map(|field| {
            let value = match &field.value {
                FieldValue::Text(value) => text(value.clone(), TextStyle::regular(m.value_pt)),
                FieldValue::Choice {
                    options,
                    marks,
                    notes,
                } => choice_row(m.value_pt, field.label, options, *marks, notes),
            };
            let label = text(field.label, TextStyle::bold(m.label_pt));
            column(field.width_ratio, style, vec![label, value])
        })
        .collect();

    Node::Row {
        style: BoxStyle {
            min_height_mm: min_height,
            ..BoxStyle::default()
        },
        children,
    }
}

fn choice_row(
    size_pt: f32,
    label: &str,
    options: &[&'static str; 2],
    marks: CheckPair,
    notes: &str,
) -> Node {
    let [first, second] = FieldValue::choice_keys(label, options);
    split(vec![
        plain(0.2, checkbox(first, marks.first, options[0], size_pt)),
        plain(0.2, checkbox(second, marks.second, options[1], size_pt)),
        plain(0.6, text(notes, TextStyle::regular(size_pt))),
    ])
}

fn checkbox(key: String, checked: bool, label: &str, size_pt: f32) -> Node {
    Node::Checkbox {
        key,
        checked,
        label: label.to_string(),
        size_pt,
    }
}

fn crew_table(geometry: &LayoutGeometry, table: &CrewTable, plan: &PagePlan) -> Vec<Node> {
    let m = geometry.metrics();
    let heading = CrewTablePolicy::heading(Region::CrewTable.title(), plan.continuation);
    let mut nodes = vec![title_bar(geometry, &heading)];

    let header_cells = CREW_COLUMNS
        .iter()
        .map(|c| {
            let mut content = vec![text(c.header, TextStyle::bold(m.label_pt))];
            if c.kind == CrewColumnKind::StandardDepth {
                content.push(split(vec![
                    plain(0.5, text(DEPTH_YES, TextStyle::bold(m.label_pt))),
                    plain(0.5, text(DEPTH_NO, TextStyle::bold(m.label_pt))),
                ]));
            }
            column(c.width_ratio, cell_style(m.crew_header_mm), content)
        })
        .collect();
    nodes.push(split(header_cells));

    for row in table.rows_in(plan.crew_rows.clone()) {
        nodes.push(crew_row(geometry, row));
    }
    nodes
}

fn crew_row(geometry: &LayoutGeometry, row: &CrewRow) -> Node {
    let m = geometry.metrics();
    let cells = CREW_COLUMNS
        .iter()
        .map(|c| {
            let content = if c.kind == CrewColumnKind::StandardDepth {
                let marks = row.depth_marks();
                let [yes, no] = row.depth_keys();
                vec![split(vec![
                    plain(0.5, checkbox(yes, marks.first, "", m.value_pt)),
                    plain(0.5, checkbox(no, marks.second, "", m.value_pt)),
                ])]
            } else {
                let style = if c.kind == CrewColumnKind::Number {
                    TextStyle::bold(m.value_pt)
                } else {
                    TextStyle::regular(m.value_pt)
                };
                vec![text(row.text(c.kind), style)]
            };
            column(c.width_ratio, cell_style(m.crew_row_mm), content)
        })
        .collect();

    split(cells)
}

fn narratives(ctx: &RenderContext<'_>) -> Vec<Node> {
    let m = ctx.geometry.metrics();
    let mut nodes = vec![title_bar(&ctx.geometry, Region::DiverNarratives.title())];
    let items = form::narratives(ctx.view);

    let heading = TextStyle::bold(m.value_pt).indented(2.0);
    let body = TextStyle::regular(m.value_pt);

    if items.is_empty() {
        nodes.push(text(form::NO_NARRATIVES, body.indented(2.0)));
    }
    for item in items {
        nodes.push(text(item.heading, heading));
        nodes.push(text(item.body, body.indented(4.0)));
    }
    nodes
}

fn signatures(ctx: &RenderContext<'_>, height: f32) -> Node {
    let m = ctx.geometry.metrics();
    let caption_h = 2.0 * m.line_mm + 2.0;
    let area_h = height - caption_h - 3.0;
    let box_style = BoxStyle {
        border: true,
        padding_mm: 2.0,
        min_height_mm: height,
        ..BoxStyle::default()
    };

    let children = form::signature_captions(ctx.view)
        .into_iter()
        .enumerate()
        .map(|(i, (title, name))| {
            let area = if i == 0 {
                supervisor_area(ctx, area_h)
            } else {
                placeholder_area(signature::PLACEHOLDER_LABEL, m.value_pt, area_h)
            };
            column(
                0.5,
                box_style,
                vec![
                    area,
                    Node::Rule,
                    text(title, TextStyle::bold(m.label_pt + 0.5)),
                    text(name, TextStyle::regular(m.label_pt + 0.5)),
                ],
            )
        })
        .collect();

    split(children)
}

fn placeholder_area(label: &str, size_pt: f32, height: f32) -> Node {
    let centered = TextStyle::regular(size_pt).aligned(Align::Center);
    Node::Column {
        width_ratio: 1.0,
        style: BoxStyle {
            min_height_mm: height,
            padding_mm: height / 3.0,
            ..BoxStyle::default()
        },
        children: vec![text(label, centered)],
    }
}

fn supervisor_area(ctx: &RenderContext<'_>, height: f32) -> Node {
    let m = ctx.geometry.metrics();
    let resolved = &ctx.signature;

    let label = match &resolved.block {
        SignatureBlock::Placeholder { label } => return placeholder_area(label, m.value_pt, height),
        SignatureBlock::Signed { .. } => signature::IMAGE_UNAVAILABLE_LABEL,
    };

    let signature_node = match &resolved.image {
        Some(image) => Node::Image {
            data: ImageData::Rgb(image.clone()),
            max_width_mm: signature::SIGNATURE_BOX_WIDTH_MM,
            max_height_mm: signature::SIGNATURE_BOX_HEIGHT_MM.min(height),
            align: Align::Left,
        },
        None => text(label, TextStyle::regular(m.small_pt)),
    };

    let mut stamp = Vec::new();
    if let Some(qr) = &resolved.qr {
        stamp.push(Node::Image {
            data: ImageData::Gray(qr.clone()),
            max_width_mm: signature::STAMP_QR_MM,
            max_height_mm: signature::STAMP_QR_MM.min(height),
            align: Align::Right,
        });
    }
    for line in resolved.block.stamp_lines() {
        stamp.push(text(line, TextStyle::bold(m.small_pt).aligned(Align::Right)));
    }

    Node::Row {
        style: BoxStyle {
            min_height_mm: height,
            ..BoxStyle::default()
        },
        children: vec![
            column(0.6, BoxStyle::default(), vec![signature_node]),
            column(0.4, BoxStyle::default(), stamp),
        ],
    }
}

fn footer(ctx: &RenderContext<'_>, plan: &PagePlan) -> Vec<Node> {
    let small = TextStyle::regular(ctx.geometry.metrics().small_pt);
    let folio = text(format!("Folio {}", ctx.view.short_id), small);
    let count = text(plan.footer_label(), small.aligned(Align::Right));
    vec![
        Node::Rule,
        Node::Spacer { height_mm: 0.8 },
        split(vec![plain(0.5, folio), plain(0.5, count)]),
    ]
}
