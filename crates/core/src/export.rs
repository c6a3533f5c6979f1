//! Presentation of listed nodes: nested HTML list, JSON report, plain text.
//!
//! Every renderer asks each node for its aggregate size, so rendering a
//! listing is what triggers the size walks.

use std::path::Path;

use serde::Serialize;

use crate::error::FsResult;
use crate::human::SizeFormat;
use crate::model::{FilesystemNode, NodeKind};

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub path: String,
    pub name: String,
    pub kind: NodeKind,
    pub is_link: bool,
    pub link_target: Option<String>,
    pub readable: bool,
    pub size_mb: Option<f64>,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeReport>>,
}

impl NodeReport {
    pub fn from_node(node: &FilesystemNode, fmt: &SizeFormat) -> FsResult<Self> {
        let class = node.classify()?;
        let size_mb = node.total_size_mb()?;
        let children = node
            .children()
            .map(|children| {
                children
                    .iter()
                    .map(|child| Self::from_node(child, fmt))
                    .collect::<FsResult<Vec<_>>>()
            })
            .transpose()?;
        Ok(Self {
            path: node.full_path().display().to_string(),
            name: node.base_name(),
            kind: class.kind,
            is_link: class.is_link,
            link_target: node.link_target()?.map(|t| t.display().to_string()),
            readable: class.is_readable,
            size_mb,
            size: fmt.format_size(size_mb),
            children,
        })
    }
}

pub fn to_json(
    root: &Path,
    nodes: &[FilesystemNode],
    fmt: &SizeFormat,
) -> FsResult<serde_json::Value> {
    let reports = nodes
        .iter()
        .map(|node| NodeReport::from_node(node, fmt))
        .collect::<FsResult<Vec<_>>>()?;
    Ok(serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "root": root,
        "nodes": reports,
    }))
}

/// `<li>` for one node; an expanded directory carries its children as a nested `<ul>`.
pub fn render_item(node: &FilesystemNode, fmt: &SizeFormat) -> FsResult<String> {
    let class = node.classify()?;
    let mut html = String::from("<li class=\"");
    html.push_str(if class.kind == NodeKind::Directory {
        "directory"
    } else {
        "file"
    });
    if !class.is_readable {
        html.push_str(" incorrect");
    }
    html.push_str("\"><span>");
    html.push_str(&escape_html(&node.base_name()));
    html.push_str("</span>");

    if class.is_link {
        let target = node
            .link_target()?
            .map(|t| t.display().to_string())
            .unwrap_or_default();
        html.push_str("<span> -> ");
        html.push_str(&escape_html(&target));
        html.push_str("</span>");
    }

    html.push_str(" <span>(");
    html.push_str(&escape_html(&fmt.format_size(node.total_size_mb()?)));
    html.push_str(")</span>");

    if let Some(children) = node.children().filter(|c| !c.is_empty()) {
        html.push_str(&render_nested(children, fmt, None)?);
    }
    html.push_str("</li>");
    Ok(html)
}

pub fn render_list(nodes: &[FilesystemNode], fmt: &SizeFormat) -> FsResult<String> {
    render_nested(nodes, fmt, Some("filesystem-report"))
}

fn render_nested(
    nodes: &[FilesystemNode],
    fmt: &SizeFormat,
    class: Option<&str>,
) -> FsResult<String> {
    let mut html = match class {
        Some(class) => format!("<ul class=\"{class}\">"),
        None => String::from("<ul>"),
    };
    for node in nodes {
        html.push_str(&render_item(node, fmt)?);
    }
    html.push_str("</ul>");
    Ok(html)
}

/// Indented listing, one node per line, children two spaces deeper.
pub fn render_text(nodes: &[FilesystemNode], fmt: &SizeFormat) -> FsResult<String> {
    let mut out = String::new();
    write_text(nodes, fmt, 0, &mut out)?;
    Ok(out)
}

fn write_text(
    nodes: &[FilesystemNode],
    fmt: &SizeFormat,
    level: usize,
    out: &mut String,
) -> FsResult<()> {
    for node in nodes {
        let class = node.classify()?;
        out.push_str(&"  ".repeat(level));
        out.push_str(&node.base_name());
        if class.kind == NodeKind::Directory {
            out.push('/');
        }
        if let Some(target) = node.link_target()? {
            out.push_str(&format!(" -> {}", target.display()));
        }
        if !class.is_readable {
            out.push_str(" [unreadable]");
        }
        out.push_str(&format!("  ({})\n", fmt.format_size(node.total_size_mb()?)));
        if let Some(children) = node.children() {
            write_text(children, fmt, level + 1, out)?;
        }
    }
    Ok(())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
