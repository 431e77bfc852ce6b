//! 原始事件帧定义

/// 一个完整的 SSE 事件块
///
/// 不含结尾的空行。
///
/// # 帧格式
///
/// ```text
/// event: thread.message.delta
/// data: {"delta": ...}
/// id: 42
/// : 注释行
/// <空行>
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEvent<'b> {
    /// 事件块原始字节
    pub data: &'b [u8],
}

/// 事件块中的单个字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'b> {
    pub name: &'b [u8],
    pub value: &'b [u8],
}

/// 解析后的事件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// `event:` 字段，缺省时为 `None`（即 `message`）
    pub event: Option<String>,
    /// 多个 `data:` 行以 `\n` 连接
    pub data: String,
    pub id: Option<String>,
    /// `retry:` 字段（毫秒）
    pub retry: Option<u64>,
}

impl<'b> RawEvent<'b> {
    /// 逐行迭代字段，跳过注释行
    pub fn fields(&self) -> impl Iterator<Item = Field<'b>> + 'b {
        let data = self.data;
        data.split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .flat_map(|line| line.split(|&b| b == b'\r'))
            .filter(|line| !line.is_empty() && line[0] != b':')
            .map(|line| match line.iter().position(|&b| b == b':') {
                Some(idx) => {
                    let value = &line[idx + 1..];
                    Field { name: &line[..idx], value: value.strip_prefix(b" ").unwrap_or(value) }
                }
                None => Field { name: line, value: &[] },
            })
    }

    /// 解析为 [`Event`]
    ///
    /// 纯注释块、没有任何已知字段的块、以及非 UTF-8 内容返回 `None`。
    pub fn parse(&self) -> Option<Event> {
        let mut event = Event::default();
        let mut has_data = false;
        let mut seen = false;

        for field in self.fields() {
            let value = core::str::from_utf8(field.value).ok()?;
            match field.name {
                b"event" => {
                    event.event = Some(value.to_owned());
                    seen = true;
                }
                b"data" => {
                    if has_data {
                        event.data.push('\n');
                    }
                    event.data.push_str(value);
                    has_data = true;
                    seen = true;
                }
                b"id" => {
                    event.id = Some(value.to_owned());
                    seen = true;
                }
                b"retry" => {
                    if let Ok(ms) = value.parse() {
                        event.retry = Some(ms);
                        seen = true;
                    }
                }
                _ => {}
            }
        }

        if seen { Some(event) } else { None }
    }
}

impl Event {
    /// 事件名，缺省为 `message`
    #[inline]
    pub fn name(&self) -> &str { self.event.as_deref().unwrap_or("message") }
}
