//! Classification of elements into form controls and content-editable hosts.
//!
//! [`classify`] turns an element into an [`ElementKind`] once, so callers do a
//! single exhaustive match instead of probing tag names repeatedly. Form
//! controls expose their value through the [`ValueControl`] capability trait,
//! implemented separately for inputs, textareas, and selects.

use crate::document::ElementRef;

/// What an element is, as far as filling text goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// A value-bearing form control.
    Control(FormControl),
    /// An element whose content is user-editable markup.
    ContentEditable(ElementRef),
    /// Anything else.
    Unsupported(ElementRef),
}

/// The form control kinds text can be filled into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormControl {
    /// `<input>` of any type except `hidden`.
    Input(InputControl),
    /// `<textarea>`.
    TextArea(TextAreaControl),
    /// `<select>`.
    Select(SelectControl),
}

/// Value access shared by all form controls.
pub trait ValueControl {
    /// The underlying element.
    fn element(&self) -> &ElementRef;

    /// Current value.
    fn value(&self) -> String;

    /// Assigns the value as the value property would.
    fn set_value(&self, value: &str);

    /// True if the control carries the `disabled` attribute.
    fn is_disabled(&self) -> bool {
        is_disabled(self.element())
    }

    /// True if the control carries the `readonly` attribute.
    fn is_read_only(&self) -> bool {
        self.element().has_attribute("readonly")
    }

    /// Declared `maxlength`, if it is a valid non-negative integer.
    fn max_length(&self) -> Option<usize> {
        None
    }
}

/// Classifies `element`.
pub fn classify(element: &ElementRef) -> ElementKind {
    match element.tag_name().as_str() {
        "input" if input_type(element) != "hidden" => {
            ElementKind::Control(FormControl::Input(InputControl(element.clone())))
        }
        "textarea" => ElementKind::Control(FormControl::TextArea(TextAreaControl(element.clone()))),
        "select" => ElementKind::Control(FormControl::Select(SelectControl(element.clone()))),
        _ if is_content_editable(element) => ElementKind::ContentEditable(element.clone()),
        _ => ElementKind::Unsupported(element.clone()),
    }
}

const INPUT_TYPES: &[&str] = &[
    "text",
    "search",
    "tel",
    "url",
    "email",
    "password",
    "date",
    "month",
    "week",
    "time",
    "datetime-local",
    "number",
    "range",
    "color",
    "checkbox",
    "radio",
    "file",
    "submit",
    "image",
    "reset",
    "button",
    "hidden",
];

/// The lowercased `type` of an input. Missing or unknown types are `text`.
pub fn input_type(element: &ElementRef) -> String {
    element
        .attribute("type")
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| INPUT_TYPES.contains(&t.as_str()))
        .unwrap_or_else(|| "text".to_string())
}

/// True if the element is content-editable, directly or by inheritance.
///
/// The nearest ancestor (or the element itself) with a recognised
/// `contenteditable` value decides; unrecognised values are skipped.
pub fn is_content_editable(element: &ElementRef) -> bool {
    for candidate in element.ancestors_inclusive() {
        let Some(value) = candidate.attribute("contenteditable") else {
            continue;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "true" | "plaintext-only" => return true,
            "false" => return false,
            _ => continue,
        }
    }
    false
}

fn is_disabled(element: &ElementRef) -> bool {
    element.has_attribute("disabled")
}

fn parse_max_length(element: &ElementRef) -> Option<usize> {
    element
        .attribute("maxlength")
        .and_then(|raw| raw.trim().parse::<usize>().ok())
}

impl FormControl {
    /// The control as its capability trait.
    pub fn as_value_control(&self) -> &dyn ValueControl {
        match self {
            FormControl::Input(control) => control,
            FormControl::TextArea(control) => control,
            FormControl::Select(control) => control,
        }
    }

    /// The underlying element.
    pub fn element(&self) -> &ElementRef {
        self.as_value_control().element()
    }
}

/// An `<input>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputControl(ElementRef);

impl InputControl {
    /// The lowercased input type.
    pub fn input_type(&self) -> String {
        input_type(&self.0)
    }
}

impl ValueControl for InputControl {
    fn element(&self) -> &ElementRef {
        &self.0
    }

    fn value(&self) -> String {
        self.0
            .dirty_value()
            .or_else(|| self.0.attribute("value"))
            .unwrap_or_default()
    }

    fn set_value(&self, value: &str) {
        self.0.set_dirty_value(Some(value.to_string()));
    }

    fn max_length(&self) -> Option<usize> {
        parse_max_length(&self.0)
    }
}

/// A `<textarea>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAreaControl(ElementRef);

impl ValueControl for TextAreaControl {
    fn element(&self) -> &ElementRef {
        &self.0
    }

    fn value(&self) -> String {
        self.0.dirty_value().unwrap_or_else(|| self.0.text_content())
    }

    fn set_value(&self, value: &str) {
        self.0.set_dirty_value(Some(value.to_string()));
    }

    fn max_length(&self) -> Option<usize> {
        parse_max_length(&self.0)
    }
}

/// A `<select>` element.
///
/// Assigning a value selects the first option with that value. When no
/// option matches, nothing is selected and the value reads as `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectControl(ElementRef);

impl SelectControl {
    /// `(value, label)` of each option in document order.
    pub fn options(&self) -> Vec<(String, String)> {
        self.0
            .descendants()
            .into_iter()
            .filter(|e| e.tag_name() == "option")
            .map(|option| {
                let label = collapse_whitespace(&option.text_content());
                let value = option.attribute("value").unwrap_or_else(|| label.clone());
                (value, label)
            })
            .collect()
    }

    fn default_value(&self) -> String {
        let options: Vec<ElementRef> = self
            .0
            .descendants()
            .into_iter()
            .filter(|e| e.tag_name() == "option")
            .collect();
        let chosen = options
            .iter()
            .find(|o| o.has_attribute("selected"))
            .or_else(|| options.first());
        chosen
            .map(|option| {
                option
                    .attribute("value")
                    .unwrap_or_else(|| collapse_whitespace(&option.text_content()))
            })
            .unwrap_or_default()
    }
}

impl ValueControl for SelectControl {
    fn element(&self) -> &ElementRef {
        &self.0
    }

    fn value(&self) -> String {
        self.0.dirty_value().unwrap_or_else(|| self.default_value())
    }

    fn set_value(&self, value: &str) {
        let selected = self
            .options()
            .into_iter()
            .find(|(option_value, _)| option_value == value)
            .map(|(option_value, _)| option_value)
            .unwrap_or_default();
        self.0.set_dirty_value(Some(selected));
    }

    fn is_read_only(&self) -> bool {
        false
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn kind_of(html: &str) -> ElementKind {
        let doc = Document::from_html(html);
        let element = doc.query_selector("#t").unwrap().expect("fixture has #t");
        classify(&element)
    }

    fn control_of(html: &str) -> FormControl {
        match kind_of(html) {
            ElementKind::Control(control) => control,
            other => panic!("expected form control, got {:?}", other),
        }
    }

    #[test]
    fn classifies_form_controls() {
        assert!(matches!(control_of(r#"<input id="t">"#), FormControl::Input(_)));
        assert!(matches!(control_of(r#"<input id="t" type="email">"#), FormControl::Input(_)));
        assert!(matches!(control_of(r#"<textarea id="t"></textarea>"#), FormControl::TextArea(_)));
        assert!(matches!(control_of(r#"<select id="t"></select>"#), FormControl::Select(_)));
    }

    #[test]
    fn unknown_input_types_behave_as_text() {
        let doc = Document::from_html(r#"<input id="a" type="bogus"><input id="b" type=" EMAIL "><input id="c" type="">"#);
        let type_of = |id: &str| input_type(&doc.get_element_by_id(id).unwrap());
        assert_eq!(type_of("a"), "text");
        assert_eq!(type_of("b"), "email");
        assert_eq!(type_of("c"), "text");
    }

    #[test]
    fn hidden_inputs_and_buttons_are_unsupported() {
        assert!(matches!(kind_of(r#"<input id="t" type="hidden">"#), ElementKind::Unsupported(_)));
        assert!(matches!(kind_of(r#"<button id="t">Go</button>"#), ElementKind::Unsupported(_)));
        assert!(matches!(kind_of(r#"<div id="t"></div>"#), ElementKind::Unsupported(_)));
    }

    #[test]
    fn content_editable_is_inherited() {
        assert!(matches!(kind_of(r#"<div id="t" contenteditable></div>"#), ElementKind::ContentEditable(_)));
        assert!(matches!(
            kind_of(r#"<div contenteditable="true"><p id="t"></p></div>"#),
            ElementKind::ContentEditable(_)
        ));
        assert!(matches!(
            kind_of(r#"<div contenteditable="true"><p id="t" contenteditable="false"></p></div>"#),
            ElementKind::Unsupported(_)
        ));
        assert!(matches!(
            kind_of(r#"<div contenteditable="plaintext-only"><span contenteditable="bogus" id="t"></span></div>"#),
            ElementKind::ContentEditable(_)
        ));
    }

    #[test]
    fn input_value_defaults_to_attribute_until_set() {
        let control = control_of(r#"<input id="t" value="initial">"#);
        let control = control.as_value_control();
        assert_eq!(control.value(), "initial");
        control.set_value("  spaced  ");
        assert_eq!(control.value(), "  spaced  ");
        assert_eq!(control.element().attribute("value").as_deref(), Some("initial"));
    }

    #[test]
    fn textarea_value_defaults_to_text() {
        let control = control_of(r#"<textarea id="t">hello</textarea>"#);
        assert_eq!(control.as_value_control().value(), "hello");
        control.as_value_control().set_value("");
        assert_eq!(control.as_value_control().value(), "");
    }

    #[test]
    fn select_value_follows_options() {
        let control = control_of(
            r#"<select id="t">
                 <option value="a">Alpha</option>
                 <option selected>  Beta  </option>
               </select>"#,
        );
        let select = control.as_value_control();
        assert_eq!(select.value(), "Beta");
        select.set_value("a");
        assert_eq!(select.value(), "a");
        select.set_value("missing");
        assert_eq!(select.value(), "");
        assert!(!select.is_read_only());
    }

    #[test]
    fn disabled_only_by_own_attribute() {
        assert!(control_of(r#"<input id="t" disabled>"#).as_value_control().is_disabled());
        assert!(!control_of(r#"<fieldset disabled><input id="t"></fieldset>"#)
            .as_value_control()
            .is_disabled());
        assert!(!control_of(r#"<fieldset><input id="t"></fieldset>"#)
            .as_value_control()
            .is_disabled());
    }

    #[test]
    fn readonly_and_maxlength() {
        let control = control_of(r#"<input id="t" readonly maxlength=" 4 ">"#);
        assert!(control.as_value_control().is_read_only());
        assert_eq!(control.as_value_control().max_length(), Some(4));

        let control = control_of(r#"<textarea id="t" maxlength="-1"></textarea>"#);
        assert_eq!(control.as_value_control().max_length(), None);
    }
}
