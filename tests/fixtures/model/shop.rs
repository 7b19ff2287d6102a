// Order side of the shop model.

#[mapping(root, namespace = "urn:shop", prop_order = "id, status, customer")]
pub struct Order {
    #[mapping(attribute, required)]
    pub id: u64,
    pub customer: Option<Box<Customer>>,
    pub lines: Vec<OrderLine>,
    pub status: Status,
    #[mapping(element_ref)]
    pub attachments: Vec<Box<dyn Attachment>>,
    pub placed: Option<Timestamp>,
}

pub struct OrderLine {
    pub sku: String,
    pub quantity: u32,
    pub tags: List<String>,
}

pub enum Status {
    #[mapping(value = "NEW")]
    New,
    Shipped,
}

pub struct Timestamp {
    pub millis: i64,
}

#[mapping(adapter_of = "Timestamp", adapts_to = "i64", package_default)]
pub struct TimestampAdapter;
