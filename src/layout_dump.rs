//! Debug dump of the computed geometry, for inspecting layouts without
//! opening the rendered image.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::diagram::Diagram;
use crate::layout::Layout;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f64,
    pub height: f64,
    pub blocks: Vec<BlockDump>,
    pub connections: Vec<ConnectionDump>,
}

#[derive(Debug, Serialize)]
pub struct BlockDump {
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Serialize)]
pub struct ConnectionDump {
    pub start: String,
    pub end: String,
    pub group: Option<String>,
    pub points: Vec<[f64; 2]>,
}

impl LayoutDump {
    pub fn from_layout(diagram: &Diagram, layout: &Layout) -> Self {
        let blocks = diagram
            .blocks
            .iter()
            .zip(&layout.coords.boxes)
            .map(|(block, rect)| BlockDump {
                name: block.name.clone(),
                x: rect.xmin,
                y: rect.ymin,
                width: rect.width(),
                height: rect.height(),
            })
            .collect();
        let connections = layout
            .routes
            .iter()
            .enumerate()
            .map(|(index, route)| {
                let conn = &diagram.connections[route.connection];
                ConnectionDump {
                    start: diagram.block_name(conn.start.block).to_string(),
                    end: diagram.block_name(conn.end.block).to_string(),
                    group: conn.group.clone(),
                    points: layout.coords.polylines[index]
                        .iter()
                        .map(|&(x, y)| [x, y])
                        .collect(),
                }
            })
            .collect();
        LayoutDump {
            width: layout.coords.width,
            height: layout.coords.height,
            blocks,
            connections,
        }
    }
}

pub fn write_layout_dump(path: &Path, diagram: &Diagram, layout: &Layout) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(diagram, layout);
    serde_yaml::to_writer(writer, &dump)?;
    Ok(())
}
