use std::fmt::Write;

use quick_xml::escape::escape;

use crate::{
    api::{CommentId, PostId, Time},
    ui::{Draft, Target, UiState},
    ThreadStore,
};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ActionKind {
    Reply,
    Edit,
    Delete,
    Save,
    Cancel,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Reply => "reply",
            ActionKind::Edit => "edit",
            ActionKind::Delete => "delete",
            ActionKind::Save => "save",
            ActionKind::Cancel => "cancel",
        }
    }

    pub fn parse(s: &str) -> Option<ActionKind> {
        Some(match s {
            "reply" => ActionKind::Reply,
            "edit" => ActionKind::Edit,
            "delete" => ActionKind::Delete,
            "save" => ActionKind::Save,
            "cancel" => ActionKind::Cancel,
            _ => return None,
        })
    }

    fn label(&self) -> &'static str {
        match self {
            ActionKind::Reply => "Reply",
            ActionKind::Edit => "Edit",
            ActionKind::Delete => "Delete",
            ActionKind::Save => "Save",
            ActionKind::Cancel => "Cancel",
        }
    }
}

/// A user interaction, resolved to what it is about
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Interaction {
    pub target: Target,
    pub action: ActionKind,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ViewNode {
    pub id: CommentId,
    pub author: String,
    pub created_at: Time,
    pub content: String,
    pub deleted: bool,
    pub depth: usize,

    /// Author of the answered comment, for replies flattened by the depth cap
    pub in_reply_to: Option<String>,

    pub actions: Vec<ActionKind>,
    pub reply_box: Option<Draft>,
    pub edit_box: Option<Draft>,
    pub error: Option<String>,
    pub children: Vec<ViewNode>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct View {
    pub post_id: PostId,
    pub composer: Draft,
    pub composer_error: Option<String>,
    pub login_prompt: bool,
    pub comments: Vec<ViewNode>,
}

pub fn render(store: &ThreadStore, ui: &UiState) -> View {
    View {
        post_id: store.post_id().clone(),
        composer: ui.top_level_draft.clone(),
        composer_error: ui.error_for(&Target::TopLevel).map(String::from),
        login_prompt: ui.login_prompt,
        comments: store
            .top_level()
            .iter()
            .filter_map(|id| node_view(store, ui, id, 0))
            .collect(),
    }
}

/// Renders the comment `id` along with all its replies, None if it is not in `store`
pub fn render_subtree(store: &ThreadStore, ui: &UiState, id: &CommentId) -> Option<ViewNode> {
    let depth = store.depth_of(id).ok()?;
    node_view(store, ui, id, depth)
}

fn node_view(store: &ThreadStore, ui: &UiState, id: &CommentId, depth: usize) -> Option<ViewNode> {
    let n = store.find(id)?;
    let in_reply_to = match n.is_flattened() {
        true => n
            .reply_to
            .as_ref()
            .and_then(|r| store.find(r))
            .map(|r| r.author.clone()),
        false => None,
    };
    let (actions, reply_box, edit_box) = match n.deleted {
        true => (Vec::new(), None, None),
        false => (
            vec![ActionKind::Reply, ActionKind::Edit, ActionKind::Delete],
            ui.reply_boxes.get(id).cloned(),
            ui.edit_boxes.get(id).cloned(),
        ),
    };
    Some(ViewNode {
        id: n.id.clone(),
        author: n.author.clone(),
        created_at: n.created_at,
        content: n.content.clone(),
        deleted: n.deleted,
        depth,
        in_reply_to,
        actions,
        reply_box,
        edit_box,
        error: ui.error_for(&Target::Comment(id.clone())).map(String::from),
        children: n
            .children
            .iter()
            .filter_map(|c| node_view(store, ui, c, depth + 1))
            .collect(),
    })
}

/// A display surface a [`View`] can be drawn onto
pub trait Surface {
    type Output;

    fn draw(&self, view: &View) -> Self::Output;
    fn draw_node(&self, node: &ViewNode) -> Self::Output;
}

/// Runs `f` on an empty string and returns what it wrote
fn written(f: impl FnOnce(&mut String) -> std::fmt::Result) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = f(&mut out);
    out
}

/// Renders to HTML markup.
///
/// Every actionable element carries `data-action`, plus `data-comment-id` unless it
/// belongs to the post's own comment box. Feed these back to [`resolve`].
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlSurface;

impl HtmlSurface {
    fn button(out: &mut String, id: Option<&CommentId>, action: ActionKind) -> std::fmt::Result {
        out.push_str("<button type=\"button\"");
        if let Some(id) = id {
            write!(out, " data-comment-id=\"{}\"", escape(&id.0[..]))?;
        }
        write!(
            out,
            " data-action=\"{}\">{}</button>",
            action.as_str(),
            action.label()
        )
    }

    fn input_box(
        out: &mut String,
        class: &str,
        id: Option<&CommentId>,
        draft: &Draft,
        with_author: bool,
        error: Option<&str>,
    ) -> std::fmt::Result {
        write!(out, "<form class=\"{class}\">")?;
        if with_author {
            write!(
                out,
                "<input name=\"author\" value=\"{}\"/>",
                escape(&draft.author[..])
            )?;
        }
        write!(
            out,
            "<textarea name=\"content\">{}</textarea>",
            escape(&draft.content[..])
        )?;
        if let Some(error) = error {
            write!(out, "<p class=\"error\">{}</p>", escape(error))?;
        }
        Self::button(out, id, ActionKind::Save)?;
        Self::button(out, id, ActionKind::Cancel)?;
        out.push_str("</form>");
        Ok(())
    }

    fn node(out: &mut String, n: &ViewNode) -> std::fmt::Result {
        write!(
            out,
            "<li class=\"comment{}\" id=\"comment-{}\" data-depth=\"{}\">",
            if n.deleted { " deleted" } else { "" },
            escape(&n.id.0[..]),
            n.depth
        )?;
        write!(
            out,
            "<div class=\"comment-meta\"><span class=\"author\">{}</span><time datetime=\"{}\">{}</time>",
            escape(&n.author[..]),
            n.created_at.to_rfc3339(),
            n.created_at.format("%Y-%m-%d %H:%M"),
        )?;
        if let Some(to) = &n.in_reply_to {
            write!(out, "<span class=\"reply-to\">in reply to {}</span>", escape(&to[..]))?;
        }
        out.push_str("</div>");
        write!(
            out,
            "<div class=\"comment-content\">{}</div>",
            escape(&n.content[..])
        )?;
        if !n.actions.is_empty() {
            out.push_str("<div class=\"comment-actions\">");
            for a in &n.actions {
                Self::button(out, Some(&n.id), *a)?;
            }
            out.push_str("</div>");
        }
        // at most one of those is open, the box owns the error message if any
        let mut error = n.error.as_deref();
        if let Some(draft) = &n.edit_box {
            Self::input_box(out, "edit-box", Some(&n.id), draft, false, error.take())?;
        }
        if let Some(draft) = &n.reply_box {
            Self::input_box(out, "reply-box", Some(&n.id), draft, true, error.take())?;
        }
        if let Some(error) = error {
            write!(out, "<p class=\"error\">{}</p>", escape(error))?;
        }
        if !n.children.is_empty() {
            out.push_str("<ul class=\"comment-list\">");
            for c in &n.children {
                Self::node(out, c)?;
            }
            out.push_str("</ul>");
        }
        out.push_str("</li>");
        Ok(())
    }
}

impl Surface for HtmlSurface {
    type Output = String;

    fn draw(&self, view: &View) -> String {
        written(|out| {
            write!(
                out,
                "<section class=\"comments\" data-post-id=\"{}\">",
                escape(&view.post_id.0[..])
            )?;
            if view.login_prompt {
                out.push_str("<div class=\"login-prompt\">Please log in first</div>");
            }
            Self::input_box(
                out,
                "comment-form",
                None,
                &view.composer,
                true,
                view.composer_error.as_deref(),
            )?;
            out.push_str("<ul class=\"comment-list\">");
            for n in &view.comments {
                Self::node(out, n)?;
            }
            out.push_str("</ul></section>");
            Ok(())
        })
    }

    fn draw_node(&self, node: &ViewNode) -> String {
        written(|out| Self::node(out, node))
    }
}

/// Renders as indented plain text, for terminals
#[derive(Clone, Copy, Debug)]
pub struct TextSurface {
    pub indent: usize,
}

impl Default for TextSurface {
    fn default() -> TextSurface {
        TextSurface { indent: 4 }
    }
}

impl TextSurface {
    fn node(&self, out: &mut String, n: &ViewNode, level: usize) -> std::fmt::Result {
        let pad = " ".repeat(self.indent * level);
        write!(
            out,
            "{pad}#{} {} at {}",
            n.id,
            n.author,
            n.created_at.format("%Y-%m-%d %H:%M")
        )?;
        if let Some(to) = &n.in_reply_to {
            write!(out, " (in reply to {to})")?;
        }
        out.push('\n');
        for line in n.content.lines() {
            writeln!(out, "{pad}  {line}")?;
        }
        if let Some(error) = &n.error {
            writeln!(out, "{pad}  !! {error}")?;
        }
        for c in &n.children {
            self.node(out, c, level + 1)?;
        }
        Ok(())
    }
}

impl Surface for TextSurface {
    type Output = String;

    fn draw(&self, view: &View) -> String {
        written(|out| {
            if view.login_prompt {
                out.push_str("Please log in first\n");
            }
            if let Some(error) = &view.composer_error {
                writeln!(out, "!! {error}")?;
            }
            if view.comments.is_empty() {
                writeln!(out, "No comments on post {} yet", view.post_id)?;
            }
            for n in &view.comments {
                self.node(out, n, 0)?;
            }
            Ok(())
        })
    }

    fn draw_node(&self, node: &ViewNode) -> String {
        written(|out| self.node(out, node, 0))
    }
}

/// Attributes of a rendered element that received a user interaction
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ElementAttrs {
    pub comment_id: Option<String>,
    pub action: Option<String>,
}

impl ElementAttrs {
    /// Picks the relevant attributes out of all the element's attributes
    pub fn from_pairs<K, V>(attrs: impl IntoIterator<Item = (K, V)>) -> ElementAttrs
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut res = ElementAttrs::default();
        for (k, v) in attrs {
            match k.as_ref() {
                "data-comment-id" => res.comment_id = Some(v.into()),
                "data-action" => res.action = Some(v.into()),
                _ => (),
            }
        }
        res
    }
}

/// Resolves an interaction on a rendered element.
///
/// Returns None when the element is not actionable, or when the comment it refers to is
/// no longer in the thread or no longer accepts that action.
pub fn resolve(store: &ThreadStore, attrs: &ElementAttrs) -> Option<Interaction> {
    let action = ActionKind::parse(attrs.action.as_deref()?)?;
    let target = match &attrs.comment_id {
        None => match action {
            ActionKind::Save | ActionKind::Cancel => Target::TopLevel,
            _ => return None,
        },
        Some(id) => {
            let id = CommentId(id.clone());
            let n = store.find(&id)?;
            if n.deleted && action != ActionKind::Cancel {
                return None;
            }
            Target::Comment(id)
        }
    };
    Some(Interaction { target, action })
}

#[cfg(test)]
mod tests {
    use quick_xml::{events::Event, Reader};

    use super::*;
    use crate::{
        store::tests::{chain, id, node},
        ThreadConfig,
    };

    fn store() -> ThreadStore {
        let mut s = ThreadStore::new(PostId(String::from("42")), &ThreadConfig::default());
        s.insert(node("1", None)).unwrap();
        s.insert(node("2", Some("1"))).unwrap();
        s.insert(node("3", None)).unwrap();
        s
    }

    /// Attributes of every element carrying a `data-action`
    fn actionable_elements(html: &str) -> Vec<ElementAttrs> {
        let mut reader = Reader::from_str(html);
        let mut res = Vec::new();
        loop {
            match reader.read_event().expect("rendered html is well-formed") {
                Event::Start(e) | Event::Empty(e) => {
                    let attrs = ElementAttrs::from_pairs(e.attributes().map(|a| {
                        let a = a.unwrap();
                        (
                            String::from_utf8(a.key.as_ref().to_vec()).unwrap(),
                            a.unescape_value().unwrap().to_string(),
                        )
                    }));
                    if attrs.action.is_some() {
                        res.push(attrs);
                    }
                }
                Event::Eof => break,
                _ => (),
            }
        }
        res
    }

    #[test]
    fn view_mirrors_store() {
        let s = store();
        let v = render(&s, &UiState::default());
        assert_eq!(v.comments.len(), 2);
        assert_eq!(v.comments[0].children[0].id, id("2"));
        assert_eq!(v.comments[0].children[0].depth, 1);
        assert_eq!(v.comments[1].actions.len(), 3);
        assert_eq!(render(&s, &UiState::default()), v);
    }

    #[test]
    fn deleted_nodes_have_no_actions() {
        let mut s = store();
        let mut ui = UiState::default();
        ui.reply_boxes.insert(id("1"), Draft::default());
        s.tombstone(&id("1")).unwrap();
        let n = render_subtree(&s, &ui, &id("1")).unwrap();
        assert!(n.deleted);
        assert!(n.actions.is_empty());
        assert_eq!(n.reply_box, None);
        assert_eq!(n.content, s.placeholder());
        assert_eq!(n.children.len(), 1);
    }

    #[test]
    fn subtree_of_unknown_comment() {
        assert_eq!(render_subtree(&store(), &UiState::default(), &id("9")), None);
    }

    #[test]
    fn flattened_replies_name_their_target() {
        let config = ThreadConfig::default();
        let mut s = ThreadStore::new(PostId(String::from("42")), &config);
        chain(&mut s, 6);
        let mut n = node("6", Some("4"));
        n.reply_to = Some(id("5"));
        s.insert(n).unwrap();
        let v = render_subtree(&s, &UiState::default(), &id("6")).unwrap();
        assert_eq!(v.depth, 5);
        assert_eq!(v.in_reply_to.as_deref(), Some("Alice"));
    }

    #[test]
    fn html_escapes_user_text() {
        let mut s = ThreadStore::new(PostId(String::from("42")), &ThreadConfig::default());
        let mut n = node("1", None);
        n.author = String::from("<script>");
        n.content = String::from("a & \"b\"");
        s.insert(n).unwrap();
        let html = HtmlSurface.draw(&render(&s, &UiState::default()));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("a &amp; &quot;b&quot;"));
    }

    #[test]
    fn html_buttons_resolve_back() {
        let s = store();
        let mut ui = UiState::default();
        ui.edit_boxes.insert(id("3"), Draft::default());
        let html = HtmlSurface.draw(&render(&s, &ui));
        let got = actionable_elements(&html)
            .iter()
            .map(|a| resolve(&s, a).expect("every rendered button resolves"))
            .collect::<Vec<_>>();
        let comment = |c: &str, action| Interaction {
            target: Target::Comment(id(c)),
            action,
        };
        assert_eq!(
            got,
            vec![
                Interaction {
                    target: Target::TopLevel,
                    action: ActionKind::Save,
                },
                Interaction {
                    target: Target::TopLevel,
                    action: ActionKind::Cancel,
                },
                comment("1", ActionKind::Reply),
                comment("1", ActionKind::Edit),
                comment("1", ActionKind::Delete),
                comment("2", ActionKind::Reply),
                comment("2", ActionKind::Edit),
                comment("2", ActionKind::Delete),
                comment("3", ActionKind::Reply),
                comment("3", ActionKind::Edit),
                comment("3", ActionKind::Delete),
                comment("3", ActionKind::Save),
                comment("3", ActionKind::Cancel),
            ],
        );
    }

    #[test]
    fn resolve_guards_lookups() {
        let mut s = store();
        let attrs = |id: Option<&str>, action: Option<&str>| ElementAttrs {
            comment_id: id.map(String::from),
            action: action.map(String::from),
        };
        assert_eq!(resolve(&s, &attrs(Some("1"), None)), None);
        assert_eq!(resolve(&s, &attrs(Some("1"), Some("explode"))), None);
        assert_eq!(resolve(&s, &attrs(Some("9"), Some("reply"))), None);
        assert_eq!(resolve(&s, &attrs(None, Some("delete"))), None);
        s.tombstone(&id("1")).unwrap();
        assert_eq!(resolve(&s, &attrs(Some("1"), Some("edit"))), None);
        assert_eq!(
            resolve(&s, &attrs(Some("1"), Some("cancel"))),
            Some(Interaction {
                target: Target::Comment(id("1")),
                action: ActionKind::Cancel,
            }),
        );
    }

    #[test]
    fn node_drawings_are_part_of_the_full_drawing() {
        let s = store();
        let mut ui = UiState::default();
        ui.reply_boxes.insert(id("1"), Draft::default());
        ui.errors.insert(Target::Comment(id("2")), String::from("oops"));
        let view = render(&s, &ui);
        let sub = render_subtree(&s, &ui, &id("1")).unwrap();
        for (full, node) in [
            (HtmlSurface.draw(&view), HtmlSurface.draw_node(&sub)),
            (
                TextSurface::default().draw(&view),
                TextSurface::default().draw_node(&sub),
            ),
        ] {
            assert!(!node.is_empty());
            assert!(full.contains(&node), "{node:?} not in {full:?}");
        }
        assert!(TextSurface::default().draw_node(&sub).contains("!! oops"));
    }

    #[test]
    fn text_surface_indents_replies() {
        let text = TextSurface::default().draw(&render(&store(), &UiState::default()));
        let lines = text.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("#1 Alice at "));
        assert_eq!(lines[1], "  comment 1");
        assert!(lines[2].starts_with("    #2 Alice at "));
        assert_eq!(lines[3], "      comment 2");
        assert!(lines[4].starts_with("#3 "));
    }
}
