use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::ParseError;
use crate::model::{PlayerRef, Point};

/// One `<instance>` element with its text fields still unparsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInstance {
    pub ordinal: usize,
    pub id: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub code: Option<String>,
    pub labels: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub ordinal: usize,
    pub source_id: i64,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub code: String,
    pub team: String,
    pub action: String,
    pub player: Option<PlayerRef>,
    pub half: Option<u8>,
    // Provider frame, before scaling and reflection.
    pub pos: Option<Point>,
    pub dest: Option<Point>,
    pub extra_labels: BTreeMap<String, String>,
}

/// Lazy walk over the `<instance>` elements of an export. Build a new reader over
/// the same text to restart.
pub struct InstanceReader<'a> {
    reader: Reader<&'a [u8]>,
    stack: Vec<String>,
    seen_instances: bool,
    ordinal: usize,
    finished: bool,
}

#[derive(Default)]
struct LabelSlot {
    group: Option<String>,
    text: Option<String>,
}

impl<'a> InstanceReader<'a> {
    pub fn new(xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            stack: Vec::new(),
            seen_instances: false,
            ordinal: 0,
            finished: false,
        }
    }

    fn xml_error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Xml {
            position: self.reader.buffer_position() as u64,
            message: message.into(),
        }
    }

    fn next_instance(&mut self) -> Result<Option<RawInstance>, ParseError> {
        let mut current: Option<RawInstance> = None;
        let mut label = LabelSlot::default();
        let mut text = String::new();

        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|err| self.xml_error(err.to_string()))?;
            match event {
                Event::Start(e) => {
                    let name = element_name(e.name().as_ref());
                    self.open_element(&name, &mut current, &mut label);
                    self.stack.push(name);
                    text.clear();
                }
                Event::Empty(e) => {
                    let name = element_name(e.name().as_ref());
                    self.open_element(&name, &mut current, &mut label);
                    let parent = self.stack.last().map(String::as_str);
                    if let Some(inst) = current.as_mut()
                        && assign(inst, parent, &name, String::new(), &mut label)
                    {
                        self.ordinal += 1;
                        return Ok(current.take());
                    }
                }
                Event::Text(t) => {
                    if current.is_some() {
                        let value = t
                            .unescape()
                            .map_err(|err| self.xml_error(err.to_string()))?;
                        text.push_str(&value);
                    }
                }
                Event::CData(c) => {
                    if current.is_some() {
                        text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::End(e) => {
                    let name = element_name(e.name().as_ref());
                    match self.stack.pop() {
                        Some(open) if open == name => {}
                        Some(open) => {
                            return Err(self.xml_error(format!(
                                "expected </{open}>, found </{name}>"
                            )));
                        }
                        None => return Err(self.xml_error(format!("unexpected </{name}>"))),
                    }
                    let parent = self.stack.last().map(String::as_str);
                    let value = std::mem::take(&mut text);
                    let Some(inst) = current.as_mut() else {
                        continue;
                    };
                    if assign(inst, parent, &name, value, &mut label) {
                        self.ordinal += 1;
                        return Ok(current.take());
                    }
                }
                Event::Eof => {
                    self.finished = true;
                    if let Some(open) = self.stack.last() {
                        return Err(self.xml_error(format!("unclosed element <{open}>")));
                    }
                    if !self.seen_instances {
                        return Err(ParseError::MissingInstances);
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn open_element(&mut self, name: &str, current: &mut Option<RawInstance>, label: &mut LabelSlot) {
        let parent = self.stack.last().map(String::as_str);
        match name {
            "ALL_INSTANCES" => self.seen_instances = true,
            "instance" if parent == Some("ALL_INSTANCES") => {
                *current = Some(RawInstance {
                    ordinal: self.ordinal,
                    ..RawInstance::default()
                });
            }
            "label" if current.is_some() => *label = LabelSlot::default(),
            _ => {}
        }
    }
}

impl Iterator for InstanceReader<'_> {
    type Item = Result<RawInstance, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_instance() {
            Ok(Some(inst)) => Some(Ok(inst)),
            Ok(None) => None,
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

// Returns true once the closing `</instance>` has been seen.
fn assign(
    inst: &mut RawInstance,
    parent: Option<&str>,
    name: &str,
    value: String,
    label: &mut LabelSlot,
) -> bool {
    match (parent, name) {
        (Some("instance"), "ID") => inst.id = Some(value),
        (Some("instance"), "start") => inst.start = Some(value),
        (Some("instance"), "end") => inst.end = Some(value),
        (Some("instance"), "code") => inst.code = Some(value),
        (Some("label"), "group") => label.group = Some(value),
        (Some("label"), "text") => label.text = Some(value),
        (Some("instance"), "label") => {
            let slot = std::mem::take(label);
            if let (Some(group), Some(text)) = (slot.group, slot.text) {
                inst.labels.push((group.trim().to_string(), text.trim().to_string()));
            }
        }
        (Some("ALL_INSTANCES"), "instance") => return true,
        _ => {}
    }
    false
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

impl EventRecord {
    pub fn from_raw(raw: RawInstance) -> Result<Self, ParseError> {
        let instance = raw
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", raw.ordinal));

        let mut labels: BTreeMap<String, String> = BTreeMap::new();
        for (group, text) in raw.labels {
            labels.insert(group, text);
        }
        let mut take = |group: &str| -> Option<String> {
            let key = labels
                .keys()
                .find(|k| k.eq_ignore_ascii_case(group))
                .cloned()?;
            labels.remove(&key)
        };

        let team = take("Team").ok_or_else(|| ParseError::MissingField {
            instance: instance.clone(),
            field: "Team",
        })?;
        let action = take("Action")
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ParseError::MissingField {
                instance: instance.clone(),
                field: "Action",
            })?;
        let code = raw.code.ok_or_else(|| ParseError::MissingField {
            instance: instance.clone(),
            field: "code",
        })?;

        let half = take("Half").and_then(|h| parse_half(&h));
        let player_label = take("Player");
        let pos_x = optional_number(&instance, "pos_x", take("pos_x"))?;
        let pos_y = optional_number(&instance, "pos_y", take("pos_y"))?;
        let dest_x = optional_number(&instance, "pos_dest_x", take("pos_dest_x"))?;
        let dest_y = optional_number(&instance, "pos_dest_y", take("pos_dest_y"))?;

        let source_id = match raw.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.parse::<i64>().map_err(|_| ParseError::InvalidNumber {
                instance: instance.clone(),
                field: "ID".to_string(),
                value: id.to_string(),
            })?,
            None => raw.ordinal as i64,
        };
        let start_time = optional_number(&instance, "start", raw.start)?;
        let end_time = optional_number(&instance, "end", raw.end)?;

        let mut player = player_from_code(&code);
        if let Some(name) = player_label.filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case("none")) {
            player = Some(PlayerRef {
                name,
                number: player.and_then(|p| p.number),
            });
        }

        Ok(Self {
            ordinal: raw.ordinal,
            source_id,
            start_time,
            end_time,
            code,
            team,
            action,
            player,
            half,
            pos: pos_x.zip(pos_y).map(|(x, y)| Point::new(x, y)),
            dest: dest_x.zip(dest_y).map(|(x, y)| Point::new(x, y)),
            extra_labels: labels,
        })
    }
}

fn optional_number(instance: &str, field: &str, raw: Option<String>) -> Result<Option<f64>, ParseError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ParseError::InvalidNumber {
            instance: instance.to_string(),
            field: field.to_string(),
            value: trimmed.to_string(),
        })
}

fn parse_half(raw: &str) -> Option<u8> {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u8>().ok().filter(|h| *h > 0)
}

/// `"7. Avihai Wodaje (Bnei Yehuda) - Passes accurate"` → Avihai Wodaje, #7.
/// Codes without the shirt-number prefix are team-level events.
pub fn player_from_code(code: &str) -> Option<PlayerRef> {
    let head = code.split(" - ").next()?.trim();
    let (number, rest) = head.split_once('.')?;
    let number = number.trim().parse::<u32>().ok()?;
    let name = rest.split('(').next()?.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(PlayerRef {
        name: name.to_string(),
        number: Some(number),
    })
}

pub fn parse_events(xml: &str) -> Result<Vec<EventRecord>, ParseError> {
    let records = InstanceReader::new(xml)
        .map(|raw| raw.and_then(EventRecord::from_raw))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("Extracted {} events", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> String {
        format!("<file><ALL_INSTANCES>{body}</ALL_INSTANCES><ROWS></ROWS></file>")
    }

    #[test]
    fn player_code_variants() {
        let p = player_from_code("7. Avihai Wodaje (Bnei Yehuda) - Passes accurate").unwrap();
        assert_eq!(p.name, "Avihai Wodaje");
        assert_eq!(p.number, Some(7));

        let p = player_from_code("10. J. Smith").unwrap();
        assert_eq!(p.name, "J. Smith");

        assert!(player_from_code("Bnei Yehuda Tel-Aviv").is_none());
        assert!(player_from_code("3. None").is_none());
    }

    #[test]
    fn reader_is_lazy_and_restartable() {
        let xml = doc(
            "<instance><ID>1</ID><code>Start</code></instance>\
             <instance><ID>2</ID><code>End</code></instance>",
        );
        let mut reader = InstanceReader::new(&xml);
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.id.as_deref(), Some("1"));
        assert_eq!(first.ordinal, 0);

        let again: Vec<_> = InstanceReader::new(&xml).collect::<Result<_, _>>().unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again[1].ordinal, 1);
        assert_eq!(again[1].code.as_deref(), Some("End"));
    }

    #[test]
    fn escaped_text_is_unescaped() {
        let xml = doc(
            "<instance><ID>1</ID><code>9. Tom &amp; Jerry</code>\
             <label><group>Team</group><text>A &amp; B</text></label>\
             <label><group>Action</group><text>Goals</text></label></instance>",
        );
        let events = parse_events(&xml).unwrap();
        assert_eq!(events[0].team, "A & B");
        assert_eq!(events[0].player.as_ref().unwrap().name, "Tom & Jerry");
    }

    #[test]
    fn mismatched_close_is_an_error() {
        let xml = "<file><ALL_INSTANCES><instance><ID>1</start></instance></ALL_INSTANCES></file>";
        assert!(matches!(parse_events(xml), Err(ParseError::Xml { .. })));
    }

    #[test]
    fn empty_optional_elements_are_absent() {
        let xml = doc(
            "<instance><ID>4</ID><start>10</start><end/><code>5. Ron Levi</code>\
             <label><group>Team</group><text>A</text></label>\
             <label><group>Action</group><text>Clearances</text></label>\
             <label><group>pos_x</group><text></text></label></instance>",
        );
        let events = parse_events(&xml).unwrap();
        assert_eq!(events[0].end_time, None);
        assert_eq!(events[0].pos, None);
        assert_eq!(events[0].start_time, Some(10.0));
    }

    #[test]
    fn bad_coordinate_names_the_field() {
        let xml = doc(
            "<instance><ID>8</ID><code>5. Ron Levi</code>\
             <label><group>Team</group><text>A</text></label>\
             <label><group>Action</group><text>Clearances</text></label>\
             <label><group>pos_x</group><text>left</text></label></instance>",
        );
        match parse_events(&xml) {
            Err(ParseError::InvalidNumber { instance, field, .. }) => {
                assert_eq!(instance, "8");
                assert_eq!(field, "pos_x");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
