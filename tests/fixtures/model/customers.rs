// Customer side of the shop model.

pub trait Attachment {}

#[mapping(root = "note")]
pub struct Note {
    pub text: String,
}

impl Attachment for Note {}

#[mapping(root = "link")]
pub struct Link {
    #[mapping(attribute)]
    pub href: String,
}

impl Attachment for Link {}

#[mapping(root, namespace = "urn:shop")]
pub struct Customer {
    pub name: String,
    #[mapping(name = "purchases")]
    pub orders: Vec<Order>,
}
