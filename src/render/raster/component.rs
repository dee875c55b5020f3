//! Component tree mounted into the off-screen host.
//!
//! Sizes are CSS pixels (96 per inch); the rasterizer multiplies them by
//! the device scale when painting.

use crate::crew::{CrewColumnKind, CrewTable, CrewTablePolicy, CREW_COLUMNS, DEPTH_NO, DEPTH_YES};
use crate::form::{self, Field, FieldValue};
use crate::geometry::{PagePlan, Region, RegionHeight};
use crate::render::RenderContext;
use crate::signature::{self, SignatureBlock};
use ::image::{GrayImage, RgbImage};
use std::sync::Arc;

pub const CSS_PX_PER_MM: f32 = 96.0 / 25.4;

pub fn px(mm: f32) -> f32 {
    mm * CSS_PX_PER_MM
}

pub fn font_px(pt: f32) -> f32 {
    pt * 96.0 / 72.0
}

// ============================================================================
// Components
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Start,
    Center,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    pub border: bool,
    /// Gray background level, 0 black to 255 white.
    pub background: Option<u8>,
    pub padding: f32,
    pub min_height: f32,
    pub divider_below: bool,
}

#[derive(Debug, Clone)]
pub enum Picture {
    Rgb(Arc<RgbImage>),
    Gray(Arc<GrayImage>),
}

impl Picture {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Picture::Rgb(img) => img.dimensions(),
            Picture::Gray(img) => img.dimensions(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Component {
    /// One physical page of fixed size.
    Page {
        index: usize,
        width: f32,
        height: f32,
        margin: f32,
        gap: f32,
        children: Vec<Component>,
    },
    Region {
        region: Region,
        height: RegionHeight,
        pinned_bottom: bool,
        frame: Frame,
        children: Vec<Component>,
    },
    /// Children top to bottom.
    Stack {
        frame: Frame,
        children: Vec<Component>,
    },
    /// Children left to right, each taking a share of the width.
    Split {
        frame: Frame,
        children: Vec<(f32, Component)>,
    },
    Label {
        text: String,
        size: f32,
        bold: bool,
        align: TextAlign,
        inset: f32,
    },
    Image {
        picture: Picture,
        max_width: f32,
        max_height: f32,
        align: TextAlign,
    },
    Tick {
        /// Name recorded in the page summary.
        key: String,
        checked: bool,
        caption: String,
        size: f32,
    },
    Divider,
    Gap(f32),
}

fn label(text: impl Into<String>, size_pt: f32, bold: bool) -> Component {
    Component::Label {
        text: text.into(),
        size: font_px(size_pt),
        bold,
        align: TextAlign::Start,
        inset: 0.0,
    }
}

fn tick(key: String, checked: bool, caption: &str, size_pt: f32) -> Component {
    Component::Tick {
        key,
        checked,
        caption: caption.to_string(),
        size: font_px(size_pt),
    }
}

fn aligned(mut component: Component, to: TextAlign) -> Component {
    if let Component::Label { align, .. } = &mut component {
        *align = to;
    }
    component
}

fn inset(mut component: Component, by_mm: f32) -> Component {
    if let Component::Label { inset, .. } = &mut component {
        *inset = px(by_mm);
    }
    component
}

fn stack(frame: Frame, children: Vec<Component>) -> Component {
    Component::Stack { frame, children }
}

fn split(children: Vec<(f32, Component)>) -> Component {
    Component::Split {
        frame: Frame::default(),
        children,
    }
}

fn cell(min_height_mm: f32, children: Vec<Component>) -> Component {
    stack(
        Frame {
            border: true,
            padding: px(1.0),
            min_height: px(min_height_mm),
            ..Frame::default()
        },
        children,
    )
}

// ============================================================================
// Tree Construction
// ============================================================================

/// One `Page` component per page plan.
pub fn build_pages(ctx: &RenderContext<'_>) -> Vec<Component> {
    let geometry = ctx.geometry;
    let table = ctx.crew_table();

    geometry
        .page_plans()
        .into_iter()
        .map(|plan| Component::Page {
            index: plan.index,
            width: px(geometry.page.width_mm),
            height: px(geometry.page.height_mm),
            margin: px(geometry.margin_mm),
            gap: px(crate::geometry::REGION_GAP_MM),
            children: plan
                .regions
                .iter()
                .map(|region| region_component(ctx, &plan, &table, *region))
                .collect(),
        })
        .collect()
}

fn region_component(
    ctx: &RenderContext<'_>,
    plan: &PagePlan,
    table: &CrewTable,
    region: Region,
) -> Component {
    let g = ctx.geometry;
    let m = g.metrics();
    let height = g.region_height(region, plan.crew_rows.len());
    let height_px = match height {
        RegionHeight::Fixed(h) => RegionHeight::Fixed(px(h)),
        RegionHeight::AtLeast(h) => RegionHeight::AtLeast(px(h)),
    };
    let mut frame = Frame::default();

    let children = match region {
        Region::Header => {
            frame.divider_below = true;
            let [title, subtitle, folio] = form::header_lines(ctx.view, plan);
            let titles = vec![
                label(title, m.title_pt, true),
                label(subtitle, m.small_pt + 1.0, false),
            ];
            let folio = aligned(label(folio, m.value_pt, true), TextAlign::End);
            vec![split(vec![
                (0.65, stack(Frame::default(), titles)),
                (0.35, stack(Frame::default(), vec![folio])),
            ])]
        }
        Region::MetaBox => vec![fields(ctx, &form::meta_fields(ctx.view), height.base())],
        Region::GeneralData => {
            let mut rows = vec![title_strip(ctx, Region::GeneralData.title())];
            for row in form::general_rows(ctx.view) {
                rows.push(fields(ctx, &row, m.field_row_mm));
            }
            rows
        }
        Region::CrewTable => crew(ctx, table, plan),
        Region::DiverNarratives => {
            frame.border = true;
            let mut items = vec![title_strip(ctx, Region::DiverNarratives.title())];
            let narratives = form::narratives(ctx.view);
            if narratives.is_empty() {
                items.push(inset(label(form::NO_NARRATIVES, m.value_pt, false), 2.0));
            }
            for n in narratives {
                items.push(inset(label(n.heading, m.value_pt, true), 2.0));
                items.push(inset(label(n.body, m.value_pt, false), 4.0));
            }
            items
        }
        Region::Observations => {
            frame.border = true;
            let text = ctx.view.observations.clone();
            vec![
                title_strip(ctx, Region::Observations.title()),
                inset(label(text, m.value_pt, false), 2.0),
            ]
        }
        Region::Signatures => vec![signatures(ctx, height.base())],
        Region::Footer => {
            let folio = label(format!("Folio {}", ctx.view.short_id), m.small_pt, false);
            let count = label(plan.footer_label(), m.small_pt, false);
            vec![
                Component::Divider,
                Component::Gap(px(0.8)),
                split(vec![(0.5, folio), (0.5, aligned(count, TextAlign::End))]),
            ]
        }
    };

    Component::Region {
        region,
        height: height_px,
        pinned_bottom: region == Region::Footer,
        frame,
        children,
    }
}

fn title_strip(ctx: &RenderContext<'_>, title: &str) -> Component {
    let m = ctx.geometry.metrics();
    stack(
        Frame {
            border: true,
            background: Some(224),
            padding: px(1.2),
            min_height: px(m.section_title_mm),
            divider_below: false,
        },
        vec![label(title, m.section_pt, true)],
    )
}

fn fields(ctx: &RenderContext<'_>, row: &[Field], min_height_mm: f32) -> Component {
    let m = ctx.geometry.metrics();
    let boxed = |field: &Field| {
        let value = match &field.value {
            FieldValue::Text(text) => label(text.clone(), m.value_pt, false),
            FieldValue::Choice {
                options,
                marks,
                notes,
            } => {
                let [first, second] = FieldValue::choice_keys(field.label, options);
                split(vec![
                    (0.2, tick(first, marks.first, options[0], m.value_pt)),
                    (0.2, tick(second, marks.second, options[1], m.value_pt)),
                    (0.6, label(notes.clone(), m.value_pt, false)),
                ])
            }
        };
        let name = label(field.label, m.label_pt, true);
        (field.width_ratio, cell(min_height_mm, vec![name, value]))
    };
    split(row.iter().map(boxed).collect())
}

fn crew(ctx: &RenderContext<'_>, table: &CrewTable, plan: &PagePlan) -> Vec<Component> {
    let m = ctx.geometry.metrics();
    let heading = CrewTablePolicy::heading(Region::CrewTable.title(), plan.continuation);
    let mut rows = vec![title_strip(ctx, &heading)];

    rows.push(split(
        CREW_COLUMNS
            .iter()
            .map(|c| {
                let mut content = vec![label(c.header, m.label_pt, true)];
                if c.kind == CrewColumnKind::StandardDepth {
                    content.push(split(vec![
                        (0.5, label(DEPTH_YES, m.label_pt, true)),
                        (0.5, label(DEPTH_NO, m.label_pt, true)),
                    ]));
                }
                (c.width_ratio, cell(m.crew_header_mm, content))
            })
            .collect(),
    ));

    for row in table.rows_in(plan.crew_rows.clone()) {
        rows.push(split(
            CREW_COLUMNS
                .iter()
                .map(|c| {
                    let content = if c.kind == CrewColumnKind::StandardDepth {
                        let marks = row.depth_marks();
                        let [yes, no] = row.depth_keys();
                        split(vec![
                            (0.5, tick(yes, marks.first, "", m.value_pt)),
                            (0.5, tick(no, marks.second, "", m.value_pt)),
                        ])
                    } else {
                        let bold = c.kind == CrewColumnKind::Number;
                        label(row.text(c.kind), m.value_pt, bold)
                    };
                    (c.width_ratio, cell(m.crew_row_mm, vec![content]))
                })
                .collect(),
        ));
    }
    rows
}

fn signatures(ctx: &RenderContext<'_>, height_mm: f32) -> Component {
    let m = ctx.geometry.metrics();
    let caption_mm = 2.0 * m.line_mm + 2.0;
    let area_mm = height_mm - caption_mm - 3.0;
    let boxed = Frame {
        border: true,
        padding: px(2.0),
        min_height: px(height_mm),
        divider_below: false,
        background: None,
    };

    split(
        form::signature_captions(ctx.view)
            .into_iter()
            .enumerate()
            .map(|(i, (title, name))| {
                let area = if i == 0 {
                    supervisor_area(ctx, area_mm)
                } else {
                    placeholder(signature::PLACEHOLDER_LABEL, m.value_pt, area_mm)
                };
                (
                    0.5,
                    stack(
                        boxed,
                        vec![
                            area,
                            Component::Divider,
                            label(title, m.label_pt + 0.5, true),
                            label(name, m.label_pt + 0.5, false),
                        ],
                    ),
                )
            })
            .collect(),
    )
}

fn placeholder(text: &str, size_pt: f32, height_mm: f32) -> Component {
    stack(
        Frame {
            padding: px(height_mm / 3.0),
            min_height: px(height_mm),
            ..Frame::default()
        },
        vec![aligned(label(text, size_pt, false), TextAlign::Center)],
    )
}

fn supervisor_area(ctx: &RenderContext<'_>, height_mm: f32) -> Component {
    let m = ctx.geometry.metrics();
    let resolved = &ctx.signature;
    if let SignatureBlock::Placeholder { label: text } = &resolved.block {
        return placeholder(text, m.value_pt, height_mm);
    }

    let drawn = match &resolved.image {
        Some(image) => Component::Image {
            picture: Picture::Rgb(image.clone()),
            max_width: px(signature::SIGNATURE_BOX_WIDTH_MM),
            max_height: px(signature::SIGNATURE_BOX_HEIGHT_MM.min(height_mm)),
            align: TextAlign::Start,
        },
        None => label(signature::IMAGE_UNAVAILABLE_LABEL, m.small_pt, false),
    };

    let mut stamp = Vec::new();
    if let Some(qr) = &resolved.qr {
        stamp.push(Component::Image {
            picture: Picture::Gray(qr.clone()),
            max_width: px(signature::STAMP_QR_MM),
            max_height: px(signature::STAMP_QR_MM.min(height_mm)),
            align: TextAlign::End,
        });
    }
    for line in resolved.block.stamp_lines() {
        stamp.push(aligned(label(line, m.small_pt, true), TextAlign::End));
    }

    let stamp = stack(Frame::default(), stamp);
    stack(
        Frame {
            min_height: px(height_mm),
            ..Frame::default()
        },
        vec![split(vec![(0.6, drawn), (0.4, stamp)])],
    )
}
